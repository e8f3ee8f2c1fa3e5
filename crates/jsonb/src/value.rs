//! Nodes of the shared state tree.
//!
//! A state tree is plain JSON. Object members are kept sorted by key, so a
//! path step is a binary search and two objects built in different orders
//! compare equal.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// One node of a state tree.
#[derive(Clone, Debug, Default)]
pub enum JsonbValue {
    /// JSON null; also what array padding is filled with
    #[default]
    Null,
    Bool(bool),
    /// Every JSON number, integral or not
    Number(f64),
    String(String),
    Array(Vec<JsonbValue>),
    Object(JsonbObject),
}

/// Members of an object node, sorted by key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonbObject {
    members: Vec<(String, JsonbValue)>,
}

impl JsonbObject {
    /// Creates an object with no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot of `key`, or where it would be inserted.
    fn find(&self, key: &str) -> Result<usize, usize> {
        self.members.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&JsonbValue> {
        self.find(key).ok().map(|i| &self.members[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut JsonbValue> {
        self.find(key).ok().map(|i| &mut self.members[i].1)
    }

    /// Sets `key` to `value`, replacing any previous member.
    pub fn insert(&mut self, key: String, value: JsonbValue) {
        *self.entry(key) = value;
    }

    /// Returns the member at `key`, creating it as `Null` when absent.
    ///
    /// Path writes descend through this, so a missing step becomes a slot
    /// the next step can reshape.
    pub fn entry(&mut self, key: String) -> &mut JsonbValue {
        let i = match self.find(&key) {
            Ok(i) => i,
            Err(i) => {
                self.members.insert(i, (key, JsonbValue::Null));
                i
            }
        };
        &mut self.members[i].1
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonbValue> {
        let i = self.find(key).ok()?;
        Some(self.members.remove(i).1)
    }

    /// Iterates members in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonbValue)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl JsonbValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JsonbValue::Null)
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, JsonbValue::Array(_))
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, JsonbValue::Object(_))
    }

    /// Returns the number if it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonbValue::Number(n) => {
                let i = *n as i64;
                (i as f64 == *n).then_some(i)
            }
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonbValue>> {
        match self {
            JsonbValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the member `key` of an object node.
    pub fn get(&self, key: &str) -> Option<&JsonbValue> {
        match self {
            JsonbValue::Object(obj) => obj.get(key),
            _ => None,
        }
    }
}

// NaN equals NaN, so writing the same NaN twice is not a change
impl PartialEq for JsonbValue {
    fn eq(&self, other: &Self) -> bool {
        use JsonbValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (String(a), String(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for JsonbValue {
    fn from(v: bool) -> Self {
        JsonbValue::Bool(v)
    }
}

impl From<i64> for JsonbValue {
    fn from(v: i64) -> Self {
        JsonbValue::Number(v as f64)
    }
}

impl From<f64> for JsonbValue {
    fn from(v: f64) -> Self {
        JsonbValue::Number(v)
    }
}

impl From<&str> for JsonbValue {
    fn from(v: &str) -> Self {
        JsonbValue::String(v.to_string())
    }
}

impl From<Vec<JsonbValue>> for JsonbValue {
    fn from(v: Vec<JsonbValue>) -> Self {
        JsonbValue::Array(v)
    }
}

impl From<JsonbObject> for JsonbValue {
    fn from(v: JsonbObject) -> Self {
        JsonbValue::Object(v)
    }
}

/// Later duplicates of a key win.
impl<K: Into<String>> FromIterator<(K, JsonbValue)> for JsonbObject {
    fn from_iter<I: IntoIterator<Item = (K, JsonbValue)>>(iter: I) -> Self {
        let mut obj = JsonbObject::new();
        for (key, value) in iter {
            obj.insert(key.into(), value);
        }
        obj
    }
}

impl<K: Into<String>> FromIterator<(K, JsonbValue)> for JsonbValue {
    fn from_iter<I: IntoIterator<Item = (K, JsonbValue)>>(iter: I) -> Self {
        JsonbValue::Object(iter.into_iter().collect())
    }
}
