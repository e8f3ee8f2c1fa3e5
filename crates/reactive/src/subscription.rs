//! Subscription management for change listeners.
//!
//! This module provides subscription IDs and a manager for tracking the
//! listeners attached to a state container or an observer.

use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback<E> = Rc<dyn Fn(&E)>;

/// Manages the listeners of one event source.
///
/// The manager never invokes callbacks itself. Callers dispatch through a
/// [`SubscriptionManager::callbacks`] snapshot and re-check
/// [`SubscriptionManager::is_subscribed`] before each call, so a listener may
/// subscribe or unsubscribe others while an event is delivered.
///
/// Removal hands the callback back instead of dropping it. A callback may own
/// handles whose `Drop` re-enters the event source, so the caller should let
/// it go only after releasing its own borrow of the manager.
pub struct SubscriptionManager<E> {
    subscriptions: HashMap<SubscriptionId, ChangeCallback<E>>,
    next_id: SubscriptionId,
}

impl<E> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriptionManager<E> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to events with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Rc::new(callback));
        id
    }

    /// Unsubscribes by ID and returns the removed callback.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<ChangeCallback<E>> {
        self.subscriptions.remove(&id)
    }

    /// Returns true if `id` is registered.
    #[inline]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Snapshots the callbacks in subscription order.
    pub fn callbacks(&self) -> Vec<(SubscriptionId, ChangeCallback<E>)> {
        let mut callbacks: Vec<_> = self
            .subscriptions
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();
        callbacks.sort_unstable_by_key(|(id, _)| *id);
        callbacks
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Removes every subscription and returns the callbacks.
    pub fn drain(&mut self) -> Vec<ChangeCallback<E>> {
        self.subscriptions.drain().map(|(_, callback)| callback).collect()
    }
}
