//! Property path evaluation for JSONB values.
//!
//! This module resolves, writes and removes values addressed by a
//! `PropertyPath`. Numeric segments index arrays; every other segment
//! addresses object fields.

use crate::path::parser::{array_index, PropertyPath};
use crate::value::{JsonbObject, JsonbValue};
use alloc::string::String;

/// Largest number of `Null` elements a single write may pad an array with.
pub const MAX_ARRAY_GAP: usize = 1024;

/// Returns true if writing `index` into an array of `len` stays within the
/// padding bound.
#[inline]
pub(crate) fn within_gap(len: usize, index: usize) -> bool {
    index <= len.saturating_add(MAX_ARRAY_GAP)
}

fn child<'a>(value: &'a JsonbValue, segment: &str) -> Option<&'a JsonbValue> {
    match value {
        JsonbValue::Object(obj) => obj.get(segment),
        JsonbValue::Array(arr) => array_index(segment).and_then(|i| arr.get(i)),
        _ => None,
    }
}

impl JsonbValue {
    /// Resolves a property path. The global path resolves to `self`.
    ///
    /// Returns `None` when any segment along the path is missing.
    pub fn get_path(&self, path: &PropertyPath) -> Option<&JsonbValue> {
        let mut current = self;
        for segment in path.segments() {
            current = child(current, segment)?;
        }
        Some(current)
    }

    /// Returns true if the path resolves to a value.
    #[inline]
    pub fn has_path(&self, path: &PropertyPath) -> bool {
        self.get_path(path).is_some()
    }

    /// Writes `value` at `path`, creating intermediate objects as needed.
    ///
    /// Writing through a scalar, or through an array with a segment that is
    /// not an index, replaces it with an object. Numeric segments on arrays
    /// extend the array with `Null` up to the index. Writing the global path
    /// replaces `self`.
    ///
    /// Returns the shallowest path whose value the write replaced: `path`
    /// itself unless an enclosing value was reshaped or padded. Returns
    /// `None`, leaving `self` untouched, when an index lies more than
    /// [`MAX_ARRAY_GAP`] past the end of its array.
    pub fn set_path(&mut self, path: &PropertyPath, value: JsonbValue) -> Option<PropertyPath> {
        if !self.can_set(path) {
            return None;
        }
        let segments = path.segments();
        let mut root = segments.len();
        let mut current = self;
        for (depth, segment) in segments.iter().enumerate() {
            let (next, reshaped) = slot(current, segment);
            if reshaped && root == segments.len() {
                root = depth;
            }
            current = next;
        }
        *current = value;
        Some(PropertyPath::from_segments(segments[..root].to_vec()))
    }

    fn can_set(&self, path: &PropertyPath) -> bool {
        let mut current = self;
        for segment in path.segments() {
            let next = match current {
                JsonbValue::Array(arr) => match array_index(segment) {
                    Some(index) if !within_gap(arr.len(), index) => return false,
                    Some(index) => arr.get(index),
                    None => None,
                },
                JsonbValue::Object(obj) => obj.get(segment),
                _ => None,
            };
            // everything below a missing value is created as objects
            match next {
                Some(next) => current = next,
                None => return true,
            }
        }
        true
    }

    /// Removes the value at `path` and returns it.
    ///
    /// Removing an array element shifts the following elements. Removing the
    /// global path resets `self` to `Null`.
    pub fn remove_path(&mut self, path: &PropertyPath) -> Option<JsonbValue> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Some(core::mem::replace(self, JsonbValue::Null));
        };
        let mut current = self;
        for segment in parents {
            current = match current {
                JsonbValue::Object(obj) => obj.get_mut(segment)?,
                JsonbValue::Array(arr) => arr.get_mut(array_index(segment)?)?,
                _ => return None,
            };
        }
        match current {
            JsonbValue::Object(obj) => obj.remove(last),
            JsonbValue::Array(arr) => {
                let index = array_index(last)?;
                (index < arr.len()).then(|| arr.remove(index))
            }
            _ => None,
        }
    }
}

/// Returns a mutable slot for `segment` under `value`, materializing it,
/// and whether `value` itself was replaced or padded on the way.
fn slot<'a>(value: &'a mut JsonbValue, segment: &str) -> (&'a mut JsonbValue, bool) {
    let index = if value.is_array() { array_index(segment) } else { None };
    let mut reshaped = false;
    if index.is_none() && !value.is_object() {
        *value = JsonbValue::Object(JsonbObject::new());
        reshaped = true;
    }
    match value {
        JsonbValue::Array(arr) => {
            let index = index.unwrap_or(arr.len());
            if arr.len() <= index {
                reshaped |= index > arr.len();
                arr.resize(index + 1, JsonbValue::Null);
            }
            (&mut arr[index], reshaped)
        }
        JsonbValue::Object(obj) => (obj.entry(String::from(segment)), reshaped),
        other => (other, reshaped),
    }
}
