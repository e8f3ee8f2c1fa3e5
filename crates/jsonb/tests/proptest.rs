//! Property-based tests for strata-jsonb using proptest.

use proptest::prelude::*;
use strata_jsonb::{JsonbValue, PropertyPath};

const KEYS: [&str; 4] = ["a", "b", "c", "d"];

fn key() -> impl Strategy<Value = &'static str> {
    prop::sample::select(KEYS.to_vec())
}

fn state_strategy() -> impl Strategy<Value = JsonbValue> {
    let leaf = prop_oneof![
        Just(JsonbValue::Null),
        any::<bool>().prop_map(JsonbValue::from),
        (0i64..4).prop_map(JsonbValue::from),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec((key(), inner.clone()), 0..4)
                .prop_map(|entries| entries.into_iter().collect::<JsonbValue>()),
            prop::collection::vec(inner, 0..3).prop_map(JsonbValue::Array),
        ]
    })
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        key().prop_map(String::from),
        (0usize..3).prop_map(|i| i.to_string()),
        Just(String::from("01")),
    ]
}

fn path_strategy() -> impl Strategy<Value = PropertyPath> {
    prop::collection::vec(segment(), 0..4).prop_map(PropertyPath::from_segments)
}

proptest! {
    /// Every reported path holds the value the patch carried there.
    #[test]
    fn merge_reports_patched_values(state in state_strategy(), patch in state_strategy()) {
        let mut merged = state.clone();
        let changed = merged.merge_patch(&patch);
        for path in &changed {
            let incoming = patch.get_path(path);
            prop_assert!(incoming.is_some(), "reported path {} missing from patch", path);
            prop_assert_eq!(merged.get_path(path), incoming);
        }
        if changed.is_empty() {
            prop_assert_eq!(merged, state);
        }
    }

    /// Paths that intersect no reported path keep their value.
    #[test]
    fn merge_leaves_unreported_paths_alone(
        state in state_strategy(),
        patch in state_strategy(),
        samples in prop::collection::vec(path_strategy(), 1..16),
    ) {
        let mut merged = state.clone();
        let changed = merged.merge_patch(&patch);
        for sample in &samples {
            if changed.iter().any(|c| c.intersects(sample)) {
                continue;
            }
            prop_assert_eq!(merged.get_path(sample), state.get_path(sample));
        }
    }

    /// A path write changes nothing outside the root it reports.
    #[test]
    fn replace_path_stays_below_reported_root(
        state in state_strategy(),
        target in path_strategy(),
        value in state_strategy(),
        remove in any::<bool>(),
        samples in prop::collection::vec(path_strategy(), 1..16),
    ) {
        let mut written = state.clone();
        let root = written.replace_path(&target, (!remove).then_some(&value));
        if root.is_none() {
            prop_assert_eq!(&written, &state);
        }
        for sample in &samples {
            if root.as_ref().map_or(false, |root| root.intersects(sample)) {
                continue;
            }
            prop_assert_eq!(written.get_path(sample), state.get_path(sample));
        }
    }

    /// Parsing the canonical form yields the same path.
    #[test]
    fn canonical_form_reparses(path in path_strategy()) {
        let reparsed = PropertyPath::parse(path.as_str()).unwrap();
        prop_assert_eq!(reparsed, path);
    }

    /// Intersection is symmetric and implied by the prefix relation.
    #[test]
    fn intersects_is_symmetric(a in path_strategy(), b in path_strategy()) {
        prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        if a.is_prefix_of(&b) {
            prop_assert!(a.intersects(&b));
        }
    }
}
