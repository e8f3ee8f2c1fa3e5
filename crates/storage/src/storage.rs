//! Initial-state storage.
//!
//! A provider keeps the value it was created with so `reset_state` can
//! restore it. The `Storage` trait abstracts where that copy lives.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use hashbrown::HashMap;
use strata_jsonb::JsonbValue;

/// Backend holding initial states, keyed by provider storage key.
pub trait Storage {
    /// Returns the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<JsonbValue>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&mut self, key: &str, value: JsonbValue);

    /// Removes the value stored under `key`.
    fn remove_item(&mut self, key: &str);

    /// Returns an independent copy of `value`.
    fn clone_value(&self, value: &JsonbValue) -> JsonbValue {
        value.clone()
    }
}

/// In-memory storage backend.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: HashMap<String, JsonbValue>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<JsonbValue> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: JsonbValue) {
        self.items.insert(String::from(key), value);
    }

    fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }
}

/// Shared handle, so a caller can keep inspecting a backend it handed to a
/// provider.
impl<S: Storage + ?Sized> Storage for Rc<RefCell<S>> {
    fn get_item(&self, key: &str) -> Option<JsonbValue> {
        self.borrow().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: JsonbValue) {
        self.borrow_mut().set_item(key, value);
    }

    fn remove_item(&mut self, key: &str) {
        self.borrow_mut().remove_item(key);
    }

    fn clone_value(&self, value: &JsonbValue) -> JsonbValue {
        self.borrow().clone_value(value)
    }
}
