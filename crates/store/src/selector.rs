//! Selector maps.
//!
//! An observer declares the slices it reads as a map from local keys to
//! property paths. `@@STATE` (or `@@GLOBAL`) selects the whole tree. A plain
//! list of paths is keyed by index: `"0"`, `"1"`, ...

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use strata_core::{Error, Result};
use strata_jsonb::PropertyPath;

/// Observer-declared mapping from local keys to selectors.
///
/// Keys keep insertion order; inserting an existing key replaces its
/// selector in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorMap {
    entries: Vec<(String, String)>,
}

impl SelectorMap {
    /// Creates an empty selector map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a selector map keyed by list index.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| (i.to_string(), path.into()))
            .collect()
    }

    /// Adds a mapping and returns the map.
    pub fn with(mut self, key: impl Into<String>, selector: impl Into<String>) -> Self {
        self.insert(key, selector);
        self
    }

    /// Adds or replaces a mapping.
    pub fn insert(&mut self, key: impl Into<String>, selector: impl Into<String>) {
        let key = key.into();
        let selector = selector.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = selector,
            None => self.entries.push((key, selector)),
        }
    }

    /// Returns the selector mapped to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s.as_str())
    }

    /// Returns the number of mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses every selector.
    ///
    /// Fails with `InvalidPath` on a malformed selector and with
    /// `InconsistentSelector` when two keys resolve to the same path.
    pub fn resolve(&self) -> Result<Selection> {
        let mut keys: Vec<String> = Vec::with_capacity(self.entries.len());
        let mut paths: Vec<PropertyPath> = Vec::with_capacity(self.entries.len());
        for (key, selector) in &self.entries {
            let path = PropertyPath::parse(selector)?;
            if let Some(i) = paths.iter().position(|p| *p == path) {
                return Err(Error::inconsistent_selector(
                    key.as_str(),
                    format!("selects `{}`, already selected by `{}`", path, keys[i]),
                ));
            }
            keys.push(key.clone());
            paths.push(path);
        }
        Ok(Selection { keys, paths })
    }
}

impl<K, V> FromIterator<(K, V)> for SelectorMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, selector) in iter {
            map.insert(key, selector);
        }
        map
    }
}

/// A resolved selector map: one key per distinct path, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    keys: Vec<String>,
    paths: Vec<PropertyPath>,
}

impl Selection {
    /// Returns the local keys.
    #[inline]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the selected paths, parallel to `keys`.
    #[inline]
    pub fn paths(&self) -> &[PropertyPath] {
        &self.paths
    }

    /// Returns true if nothing is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
