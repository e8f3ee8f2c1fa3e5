//! Write prehooks.
//!
//! Prehooks are consulted before a write reaches the state container.
//! Returning `false` vetoes the write: nothing changes and nobody is
//! notified.

use alloc::rc::Rc;
use strata_jsonb::{JsonbValue, PropertyPath};

/// State a reset prehook can inspect.
#[derive(Clone, Copy, Debug)]
pub struct ResetContext<'a> {
    /// Tree before the reset
    pub current: &'a JsonbValue,
    /// Tree the provider was created with
    pub original: &'a JsonbValue,
}

/// Hook consulted before a deep-merge write.
pub type SetStateHook = Rc<dyn Fn(&JsonbValue) -> bool>;

/// Hook consulted before a reset, with the entries about to be written.
pub type ResetStateHook = Rc<dyn Fn(&[(PropertyPath, Option<JsonbValue>)], &ResetContext<'_>) -> bool>;

/// Optional write prehooks.
#[derive(Clone, Default)]
pub struct Prehooks {
    set_state: Option<SetStateHook>,
    reset_state: Option<ResetStateHook>,
}

impl Prehooks {
    /// Creates prehooks that allow every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook consulted before `set_state`.
    pub fn with_set_state<F>(mut self, hook: F) -> Self
    where
        F: Fn(&JsonbValue) -> bool + 'static,
    {
        self.set_state = Some(Rc::new(hook));
        self
    }

    /// Sets the hook consulted before `reset_state`.
    pub fn with_reset_state<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[(PropertyPath, Option<JsonbValue>)], &ResetContext<'_>) -> bool + 'static,
    {
        self.reset_state = Some(Rc::new(hook));
        self
    }

    pub(crate) fn set_state_hook(&self) -> Option<SetStateHook> {
        self.set_state.clone()
    }

    pub(crate) fn reset_state_hook(&self) -> Option<ResetStateHook> {
        self.reset_state.clone()
    }
}

impl core::fmt::Debug for Prehooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Prehooks")
            .field("set_state", &self.set_state.is_some())
            .field("reset_state", &self.reset_state.is_some())
            .finish()
    }
}
