//! Change set for tracking which paths a write touched.
//!
//! A `ChangeSet` holds the property paths whose values changed in one state
//! write. Alongside the exact paths it keeps their ancestor closure, so the
//! intersection test against a watched path costs O(depth) lookups instead of
//! a scan over every changed path.

use alloc::vec::Vec;
use hashbrown::HashSet;
use strata_jsonb::PropertyPath;

/// The set of paths changed by one state write.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    /// Changed paths in report order, without duplicates
    paths: Vec<PropertyPath>,
    /// Exact changed paths
    exact: HashSet<PropertyPath>,
    /// Changed paths plus every ancestor of a changed path
    covered: HashSet<PropertyPath>,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a change set from reported paths.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PropertyPath>,
    {
        let mut changes = Self::new();
        for path in paths {
            changes.insert(path);
        }
        changes
    }

    /// Records a changed path. Returns false if it was already recorded.
    pub fn insert(&mut self, path: PropertyPath) -> bool {
        if !self.exact.insert(path.clone()) {
            return false;
        }
        for ancestor in path.ancestors() {
            self.covered.insert(ancestor);
        }
        self.covered.insert(path.clone());
        self.paths.push(path);
        true
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns the number of changed paths.
    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns the changed paths in report order.
    #[inline]
    pub fn paths(&self) -> &[PropertyPath] {
        &self.paths
    }

    /// Returns every changed path together with all of their ancestors.
    #[inline]
    pub fn covered(&self) -> impl Iterator<Item = &PropertyPath> {
        self.covered.iter()
    }

    /// Returns true if `path` itself was reported as changed.
    #[inline]
    pub fn contains(&self, path: &PropertyPath) -> bool {
        self.exact.contains(path)
    }

    /// Returns true if `path` intersects any changed path.
    ///
    /// A watched path is touched when it equals a changed path, is an
    /// ancestor of one (a nested value changed), or is a descendant of one
    /// (an enclosing value was replaced).
    pub fn touches(&self, path: &PropertyPath) -> bool {
        if self.covered.contains(path) {
            return true;
        }
        path.ancestors().any(|ancestor| self.exact.contains(&ancestor))
    }

}
