//! Immutable state container.
//!
//! The container owns one state tree and the `AccessorCache` built over it.
//! Every write runs in three steps:
//!
//! 1. apply the update to the tree and collect the changed paths
//! 2. route the resulting `ChangeSet` through the cache
//! 3. notify listeners, with no borrow of the container held
//!
//! Listeners may therefore read, write, connect or disconnect from inside a
//! notification.

use crate::connection::Connection;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use strata_core::{next_client_id, ClientId, Error, Result};
use strata_jsonb::{JsonbValue, PropertyPath};
use strata_reactive::{AccessorCache, ChangeSet, SharedState, SubscriptionId, SubscriptionManager};
use tracing::{debug, trace};

/// What a listener receives after a write that changed the tree.
#[derive(Clone, Debug, Default)]
pub struct ChangeEvent {
    /// Paths changed by the write
    pub changes: ChangeSet,
    /// Clients whose accessors the write touched, ascending
    pub due_clients: Vec<ClientId>,
}

impl ChangeEvent {
    /// Returns true if the write touched an accessor `client` reads through.
    #[inline]
    pub fn is_due(&self, client: ClientId) -> bool {
        self.due_clients.binary_search(&client).is_ok()
    }
}

/// Clients whose connection went away while the container was borrowed.
pub(crate) type PendingUnlinks = Rc<RefCell<Vec<ClientId>>>;

pub(crate) struct ImmutableCore {
    state: SharedState,
    cache: AccessorCache,
    listeners: SubscriptionManager<ChangeEvent>,
    pending_unlinks: PendingUnlinks,
    closed: bool,
}

pub(crate) type CoreRef = Rc<RefCell<ImmutableCore>>;

impl ImmutableCore {
    #[inline]
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::usage("the state container is closed"));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the cache after applying every queued unlink.
    pub(crate) fn cache_mut(&mut self) -> &mut AccessorCache {
        let pending = core::mem::take(&mut *self.pending_unlinks.borrow_mut());
        for client in pending {
            debug!(connection = client, "deferred unlink applied");
            self.cache.unlink_client(client);
        }
        &mut self.cache
    }
}

/// Applies `apply` to the tree and propagates the reported paths.
pub(crate) fn commit<F>(core: &CoreRef, apply: F) -> Result<ChangeSet>
where
    F: FnOnce(&mut JsonbValue) -> Vec<PropertyPath>,
{
    let (event, callbacks) = {
        let mut guard = core.borrow_mut();
        guard.ensure_open()?;
        let changed = {
            let mut state = guard.state.borrow_mut();
            apply(&mut state)
        };
        let changes = ChangeSet::from_paths(changed);
        if changes.is_empty() {
            trace!("write changed nothing");
            return Ok(changes);
        }
        let due_clients = guard.cache_mut().watch_source(&changes);
        let callbacks = guard.listeners.callbacks();
        (ChangeEvent { changes, due_clients }, callbacks)
    };

    for (id, callback) in callbacks {
        // a listener may have unsubscribed another, or closed the container
        let live = core
            .try_borrow()
            .map(|guard| !guard.closed && guard.listeners.is_subscribed(id))
            .unwrap_or(false);
        if live {
            callback(&event);
        }
    }
    Ok(event.changes)
}

/// Deep-merges `patch` into `state`.
pub(crate) fn merge(state: &mut JsonbValue, patch: &JsonbValue) -> Vec<PropertyPath> {
    state.merge_patch(patch)
}

/// Writes or removes each entry, reporting the shallowest path each one
/// changed.
pub(crate) fn replace(
    state: &mut JsonbValue,
    entries: &[(PropertyPath, Option<JsonbValue>)],
) -> Vec<PropertyPath> {
    entries
        .iter()
        .filter_map(|(path, value)| state.replace_path(path, value.as_ref()))
        .collect()
}

/// Shared state container.
///
/// Cloning yields another handle to the same container.
#[derive(Clone)]
pub struct Immutable {
    inner: CoreRef,
}

impl Immutable {
    /// Creates a container holding `value`.
    pub fn new(value: JsonbValue) -> Self {
        let state: SharedState = Rc::new(RefCell::new(value));
        let cache = AccessorCache::new(state.clone());
        Self {
            inner: Rc::new(RefCell::new(ImmutableCore {
                state,
                cache,
                listeners: SubscriptionManager::new(),
                pending_unlinks: Rc::new(RefCell::new(Vec::new())),
                closed: false,
            })),
        }
    }

    /// Opens a connection with a process-unique instance id.
    pub fn connect(&self) -> Result<Connection> {
        let pending = {
            let core = self.inner.borrow();
            core.ensure_open()?;
            core.pending_unlinks.clone()
        };
        let id = next_client_id();
        debug!(connection = id, "connection established");
        Ok(Connection::new(id, Rc::downgrade(&self.inner), pending))
    }

    /// Returns a copy of the whole tree.
    pub fn get_state(&self) -> Result<JsonbValue> {
        let core = self.inner.borrow();
        core.ensure_open()?;
        let state = core.state.borrow().clone();
        Ok(state)
    }

    /// Deep-merges `patch` into the tree.
    pub fn set(&self, patch: &JsonbValue) -> Result<ChangeSet> {
        commit(&self.inner, |state| merge(state, patch))
    }

    /// Writes each `(path, Some(value))` and removes each `(path, None)`.
    pub fn replace(&self, entries: &[(PropertyPath, Option<JsonbValue>)]) -> Result<ChangeSet> {
        commit(&self.inner, |state| replace(state, entries))
    }

    /// Registers a listener invoked after every write that changed the tree.
    pub fn subscribe<F>(&self, listener: F) -> Result<SubscriptionId>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        let mut core = self.inner.borrow_mut();
        core.ensure_open()?;
        Ok(core.listeners.subscribe(listener))
    }

    /// Removes a listener. Returns true if it was registered.
    ///
    /// The listener is dropped after the container is released, so whatever
    /// it owns may disconnect from this container.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.borrow_mut().listeners.unsubscribe(id);
        removed.is_some()
    }

    /// Closes the container, dropping every accessor and listener.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let listeners = {
            let mut core = self.inner.borrow_mut();
            if core.closed {
                return;
            }
            core.closed = true;
            core.cache.clear();
            core.pending_unlinks.borrow_mut().clear();
            core.listeners.drain()
        };
        drop(listeners);
        debug!("state container closed");
    }

    /// Returns true once `close` has run.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Returns the number of live accessors.
    pub fn accessor_count(&self) -> usize {
        self.inner.borrow_mut().cache_mut().accessor_count()
    }

    /// Returns the number of live value cells.
    pub fn atom_count(&self) -> usize {
        self.inner.borrow_mut().cache_mut().atom_count()
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Returns true if `paths` currently has a due accessor.
    pub fn is_refresh_due(&self, paths: &[PropertyPath]) -> bool {
        self.inner.borrow().cache.is_refresh_due(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn path(s: &str) -> PropertyPath {
        PropertyPath::parse(s).unwrap()
    }

    fn obj<const N: usize>(entries: [(&str, JsonbValue); N]) -> JsonbValue {
        entries.into_iter().collect()
    }

    fn make_container() -> Immutable {
        Immutable::new(obj([
            (
                "a",
                obj([("b", obj([("c", 1i64.into()), ("d", 2i64.into())]))]),
            ),
            ("list", JsonbValue::Array(vec![1i64.into(), 2i64.into(), 3i64.into()])),
        ]))
    }

    #[test]
    fn test_set_notifies_listeners() {
        let container = make_container();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = events.clone();
        container
            .subscribe(move |event| events_clone.borrow_mut().push(event.clone()))
            .unwrap();

        let changes = container
            .set(&obj([("a", obj([("b", obj([("c", 5i64.into())]))]))]))
            .unwrap();
        assert!(changes.contains(&path("a.b.c")));
        assert_eq!(events.borrow().len(), 1);
        assert!(events.borrow()[0].due_clients.is_empty());
    }

    #[test]
    fn test_noop_write_notifies_nobody() {
        let container = make_container();
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        container
            .subscribe(move |_| *count_clone.borrow_mut() += 1)
            .unwrap();

        let changes = container
            .set(&obj([("a", obj([("b", obj([("c", 1i64.into())]))]))]))
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_due_clients_reported() {
        let container = make_container();
        let x = container.connect().unwrap();
        let y = container.connect().unwrap();
        x.get(&[path("a.b.c")]).unwrap();
        y.get(&[path("a.b.d")]).unwrap();

        let seen = Rc::new(RefCell::new(ChangeEvent::default()));
        let seen_clone = seen.clone();
        container
            .subscribe(move |event| *seen_clone.borrow_mut() = event.clone())
            .unwrap();

        container
            .set(&obj([("a", obj([("b", obj([("c", 5i64.into())]))]))]))
            .unwrap();
        assert!(seen.borrow().is_due(x.instance_id()));
        assert!(!seen.borrow().is_due(y.instance_id()));
        assert!(container.is_refresh_due(&[path("a.b.c")]));
    }

    #[test]
    fn test_replace_sets_and_removes() {
        let container = make_container();
        let changes = container
            .replace(&[
                (path("a.b.c"), Some(9i64.into())),
                (path("a.b.d"), None),
                (path("a.b.x"), None),
            ])
            .unwrap();
        assert_eq!(changes.len(), 2);
        let state = container.get_state().unwrap();
        assert_eq!(state.get_path(&path("a.b.c")), Some(&JsonbValue::Number(9.0)));
        assert!(!state.has_path(&path("a.b.d")));
    }

    #[test]
    fn test_replace_array_removal_reports_array() {
        let container = make_container();
        let changes = container.replace(&[(path("list[0]"), None)]).unwrap();
        assert!(changes.contains(&path("list")));
        assert!(changes.touches(&path("list[1]")));
    }

    #[test]
    fn test_listener_may_write_and_unsubscribe() {
        let container = make_container();
        let count = Rc::new(RefCell::new(0));

        let handle = container.clone();
        let count1 = count.clone();
        let first = Rc::new(RefCell::new(None));
        let first_clone = first.clone();
        let id = container
            .subscribe(move |_| {
                *count1.borrow_mut() += 1;
                if let Some(id) = *first_clone.borrow() {
                    handle.unsubscribe(id);
                }
                let _ = handle.set(&obj([("z", true.into())]));
            })
            .unwrap();
        *first.borrow_mut() = Some(id);

        container.set(&obj([("y", true.into())])).unwrap();
        // the nested write ran after the listener removed itself
        assert_eq!(*count.borrow(), 1);
        assert_eq!(container.listener_count(), 0);
        assert!(container.get_state().unwrap().has_path(&path("z")));
    }

    #[test]
    fn test_unsubscribe_releases_owned_connection() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.get(&[path("a.b.c")]).unwrap();
        assert_eq!(container.accessor_count(), 1);

        let id = container
            .subscribe(move |_| {
                let _ = conn.instance_id();
            })
            .unwrap();
        assert!(container.unsubscribe(id));
        assert_eq!(container.accessor_count(), 0);
        assert_eq!(container.atom_count(), 0);
    }

    #[test]
    fn test_close_drops_listeners_owning_connections() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.get(&[path("a.b.c")]).unwrap();
        container
            .subscribe(move |_| {
                let _ = conn.instance_id();
            })
            .unwrap();

        container.close();
        assert_eq!(container.listener_count(), 0);
    }

    #[test]
    fn test_unlink_deferred_while_borrowed() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.get(&[path("a.b.c")]).unwrap();
        {
            let _guard = container.inner.borrow();
            conn.disconnect();
        }
        assert_eq!(container.accessor_count(), 0);
        assert_eq!(container.atom_count(), 0);
    }

    #[test]
    fn test_close() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.get(&[path("a")]).unwrap();
        container.subscribe(|_| {}).unwrap();

        container.close();
        container.close();
        assert!(container.is_closed());
        assert_eq!(container.accessor_count(), 0);
        assert_eq!(container.listener_count(), 0);
        assert!(container.connect().unwrap_err().is_usage());
        assert!(container.set(&obj([("a", 1i64.into())])).unwrap_err().is_usage());
        assert!(container.get_state().unwrap_err().is_usage());
        assert!(conn.get(&[path("a")]).unwrap_err().is_usage());
    }
}
