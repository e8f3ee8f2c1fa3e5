//! Update operators for state trees.
//!
//! `merge_patch` applies a partial state tree onto the current one:
//! - objects merge key by key
//! - an object whose keys are all indices merges into an array by index,
//!   padding with `Null` by at most `MAX_ARRAY_GAP` elements
//! - anything else replaces the target when it differs
//!
//! Each operator reports the paths at which a value was actually replaced,
//! inserted or removed, which is what change propagation consumes.

use crate::path::eval::within_gap;
use crate::path::{array_index, PropertyPath};
use crate::value::{JsonbObject, JsonbValue};
use alloc::vec::Vec;

/// Returns the patch entries in ascending index order if every key is an
/// index reachable from an array of `len` elements.
fn index_keys(obj: &JsonbObject, len: usize) -> Option<Vec<(usize, &JsonbValue)>> {
    let mut entries = obj
        .iter()
        .map(|(k, v)| array_index(k).map(|i| (i, v)))
        .collect::<Option<Vec<_>>>()?;
    entries.sort_unstable_by_key(|(i, _)| *i);
    match entries.last() {
        Some((last, _)) if !within_gap(len, *last) => None,
        _ => Some(entries),
    }
}

fn merge_at(
    target: &mut JsonbValue,
    patch: &JsonbValue,
    at: &PropertyPath,
    changed: &mut Vec<PropertyPath>,
) {
    match (target, patch) {
        (JsonbValue::Object(current), JsonbValue::Object(incoming)) => {
            for (key, value) in incoming.iter() {
                let child = at.child(key);
                if let Some(slot) = current.get_mut(key) {
                    merge_at(slot, value, &child, changed);
                } else {
                    current.insert(key.into(), value.clone());
                    changed.push(child);
                }
            }
        }
        (JsonbValue::Array(current), JsonbValue::Object(incoming))
            if index_keys(incoming, current.len()).is_some() =>
        {
            for (index, value) in index_keys(incoming, current.len()).unwrap_or_default() {
                let child = at.child(alloc::format!("{}", index));
                if index < current.len() {
                    merge_at(&mut current[index], value, &child, changed);
                } else {
                    for gap in current.len()..index {
                        changed.push(at.child(alloc::format!("{}", gap)));
                    }
                    current.resize(index + 1, JsonbValue::Null);
                    current[index] = value.clone();
                    changed.push(child);
                }
            }
        }
        (target, patch) => {
            if *target != *patch {
                *target = patch.clone();
                changed.push(at.clone());
            }
        }
    }
}

impl JsonbValue {
    /// Deep-merges `patch` into `self`.
    ///
    /// Returns the paths whose value changed. An empty result means the patch
    /// was a no-op.
    pub fn merge_patch(&mut self, patch: &JsonbValue) -> Vec<PropertyPath> {
        let mut changed = Vec::new();
        merge_at(self, patch, &PropertyPath::global(), &mut changed);
        changed
    }

    /// Replaces the value at `path`, or removes it when `value` is `None`.
    ///
    /// Returns the shallowest path whose value changed, or `None` if the
    /// tree is unchanged. Removing an array element reports the array, since
    /// every later element shifts.
    pub fn replace_path(
        &mut self,
        path: &PropertyPath,
        value: Option<&JsonbValue>,
    ) -> Option<PropertyPath> {
        match value {
            Some(value) => {
                if self.get_path(path) == Some(value) {
                    return None;
                }
                self.set_path(path, value.clone())
            }
            None => {
                let parent = path.parent();
                let in_array = parent
                    .as_ref()
                    .and_then(|p| self.get_path(p))
                    .map_or(false, JsonbValue::is_array);
                self.remove_path(path)?;
                match parent {
                    Some(parent) if in_array => Some(parent),
                    _ => Some(path.clone()),
                }
            }
        }
    }
}
