//! Observers.
//!
//! An `Observer` reads the slices its selector map declares and re-runs its
//! callbacks only when one of those slices changes.
//!
//! Lifecycle:
//!
//! - activation obtains the observer's connection (lazily, once), registers
//!   its refresh hook with the provider and reads the initial data
//! - teardown unregisters the hook, disconnects, removes the connection from
//!   the provider's registry and forgets the cached connection id
//!
//! Teardown runs on `close`, on drop and when `reselect` changes the
//! resolved path-set.

use crate::provider::{Provider, ProviderCore};
use crate::selector::{Selection, SelectorMap};
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use strata_core::{ClientId, Error, Result};
use strata_jsonb::{JsonbValue, PropertyPath};
use strata_reactive::{ChangeSet, Snapshot, SubscriptionId, SubscriptionManager};
use strata_storage::Connection;
use tracing::{debug, trace};

/// The slices an observer reads, keyed by selector key in declaration order.
///
/// A slice is `None` when its path does not resolve in the state tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Data {
    entries: Vec<(String, Option<Rc<JsonbValue>>)>,
}

impl Data {
    fn from_snapshot(selection: &Selection, snapshot: &Snapshot) -> Self {
        let entries = selection
            .keys()
            .iter()
            .zip(selection.paths())
            .map(|(key, path)| (key.clone(), snapshot.shared(path).cloned()))
            .collect();
        Self { entries }
    }

    /// Returns the slice under `key`.
    pub fn get(&self, key: &str) -> Option<&JsonbValue> {
        self.shared(key).map(|v| v.as_ref())
    }

    /// Returns the shared slice under `key`.
    pub fn shared(&self, key: &str) -> Option<&Rc<JsonbValue>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Returns true if `key` is selected.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns an iterator over the selector keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns an iterator over (key, slice) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&JsonbValue>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Returns the number of selected keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any key or slice differs. Shared slices are compared
    /// by pointer first.
    fn differs(&self, other: &Data) -> bool {
        if self.entries.len() != other.entries.len() {
            return true;
        }
        self.entries
            .iter()
            .zip(&other.entries)
            .any(|((k1, v1), (k2, v2))| {
                k1 != k2
                    || match (v1, v2) {
                        (Some(a), Some(b)) => !Rc::ptr_eq(a, b) && a != b,
                        (None, None) => false,
                        _ => true,
                    }
            })
    }
}

struct ObserverInner {
    provider: Weak<ProviderCore>,
    selection: RefCell<Selection>,
    /// Connection id, cached from first access until teardown
    conn_key: Cell<Option<ClientId>>,
    active: Cell<bool>,
    data: RefCell<Data>,
    listeners: RefCell<SubscriptionManager<Data>>,
}

impl ObserverInner {
    fn provider(&self) -> Result<Rc<ProviderCore>> {
        let provider = self
            .provider
            .upgrade()
            .ok_or_else(|| Error::usage("the store provider no longer exists"))?;
        provider.ensure_open()?;
        Ok(provider)
    }

    fn connection(&self, provider: &ProviderCore) -> Result<Rc<Connection>> {
        if let Some(conn) = self.conn_key.get().and_then(|id| provider.registered(id)) {
            return Ok(conn);
        }
        let conn = provider.connect()?;
        self.conn_key.set(Some(conn.instance_id()));
        Ok(conn)
    }

    fn live(&self) -> Result<(Rc<ProviderCore>, Rc<Connection>)> {
        let provider = self.provider()?;
        if !self.active.get() {
            return Err(Error::usage("the observer is closed"));
        }
        let conn = self.connection(&provider)?;
        Ok((provider, conn))
    }

    fn read(&self, conn: &Connection) -> Result<Data> {
        let selection = self.selection.borrow().clone();
        if selection.is_empty() {
            return Ok(Data::default());
        }
        let snapshot = conn.get(selection.paths())?;
        conn.mark_refreshed(selection.paths())?;
        Ok(Data::from_snapshot(&selection, &snapshot))
    }

    fn activate(self: &Rc<Self>) -> Result<()> {
        let provider = self.provider()?;
        let conn = self.connection(&provider)?;
        self.active.set(true);
        if !self.selection.borrow().is_empty() {
            let weak = Rc::downgrade(self);
            provider.add_notifier(
                conn.instance_id(),
                Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.refresh();
                    }
                }),
            );
        }
        debug!(connection = conn.instance_id(), "observer activated");
        self.update(&conn)
    }

    /// Re-reads the selection and runs the callbacks if any slice changed.
    fn update(&self, conn: &Connection) -> Result<()> {
        let next = self.read(conn)?;
        if !self.data.borrow().differs(&next) {
            return Ok(());
        }
        *self.data.borrow_mut() = next.clone();
        trace!(connection = conn.instance_id(), "observer data changed");

        let callbacks = self.listeners.borrow().callbacks();
        for (id, callback) in callbacks {
            let live = self.active.get() && self.listeners.borrow().is_subscribed(id);
            if live {
                callback(&next);
            }
        }
        Ok(())
    }

    fn refresh(&self) {
        if !self.active.get() {
            return;
        }
        let Some(provider) = self.provider.upgrade() else {
            return;
        };
        let Some(conn) = self.conn_key.get().and_then(|id| provider.registered(id)) else {
            return;
        };
        if let Err(err) = self.update(&conn) {
            debug!(error = %err, "observer refresh failed");
        }
    }

    fn teardown(&self) {
        self.active.set(false);
        let Some(provider) = self.provider.upgrade() else {
            return;
        };
        if provider.is_closed() {
            return;
        }
        let Some(id) = self.conn_key.get() else {
            return;
        };
        provider.remove_notifier(id);
        if let Some(conn) = provider.registered(id) {
            conn.disconnect();
        }
        provider.unregister(id);
        self.conn_key.set(None);
        debug!(connection = id, "observer torn down");
    }
}

/// Selective view over a provider's state tree.
///
/// Dropping an observer tears it down.
pub struct Observer {
    inner: Rc<ObserverInner>,
}

impl Observer {
    /// Creates an observer over the slices `selector` declares.
    pub fn new(provider: &Provider, selector: SelectorMap) -> Result<Self> {
        let core = provider.core();
        core.ensure_open()?;
        let selection = selector.resolve()?;
        let inner = Rc::new(ObserverInner {
            provider: Rc::downgrade(core),
            selection: RefCell::new(selection),
            conn_key: Cell::new(None),
            active: Cell::new(false),
            data: RefCell::new(Data::default()),
            listeners: RefCell::new(SubscriptionManager::new()),
        });
        if let Err(err) = inner.activate() {
            inner.teardown();
            return Err(err);
        }
        Ok(Self { inner })
    }

    /// Returns the current slices.
    pub fn data(&self) -> Result<Data> {
        self.inner.provider()?;
        if !self.inner.active.get() {
            return Err(Error::usage("the observer is closed"));
        }
        Ok(self.inner.data.borrow().clone())
    }

    /// Deep-merges `patch` into the state tree.
    pub fn set_state(&self, patch: &JsonbValue) -> Result<ChangeSet> {
        let (provider, conn) = self.inner.live()?;
        provider.set_state_via(&conn, patch)
    }

    /// Restores `paths` to their initial values.
    ///
    /// `None` resets the paths this observer selects: the whole tree when it
    /// selects `@@STATE`, nothing when it selects nothing.
    pub fn reset_state(&self, paths: Option<&[PropertyPath]>) -> Result<ChangeSet> {
        let (provider, conn) = self.inner.live()?;
        match paths {
            Some(paths) => provider.reset_state_via(&conn, paths),
            None => {
                let selected = self.inner.selection.borrow().paths().to_vec();
                provider.reset_state_via(&conn, &selected)
            }
        }
    }

    /// Registers a callback invoked with the new data whenever a selected
    /// slice changes.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Data) + 'static,
    {
        self.inner.listeners.borrow_mut().subscribe(callback)
    }

    /// Removes a callback. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.listeners.borrow_mut().unsubscribe(id);
        removed.is_some()
    }

    /// Switches to a new selector map.
    ///
    /// An unchanged path-set keeps the connection and only renames keys.
    /// Otherwise the observer is torn down and activated again. Callbacks
    /// run if the resulting data differs. Re-activates a closed observer.
    pub fn reselect(&self, selector: SelectorMap) -> Result<()> {
        let provider = self.inner.provider()?;
        let selection = selector.resolve()?;

        let same_paths = self.inner.active.get() && self.inner.selection.borrow().paths() == selection.paths();
        if same_paths {
            *self.inner.selection.borrow_mut() = selection;
            let conn = self.inner.connection(&provider)?;
            return self.inner.update(&conn);
        }

        self.inner.teardown();
        *self.inner.selection.borrow_mut() = selection;
        self.inner.activate()
    }

    /// Tears the observer down. Later reads and writes fail with a usage
    /// error until [`Observer::reselect`] is called. Idempotent.
    pub fn close(&self) {
        self.inner.teardown();
    }

    /// Returns true while the observer is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Returns the cached connection id.
    #[inline]
    pub fn connection_id(&self) -> Option<ClientId> {
        self.inner.conn_key.get()
    }

    /// Returns the resolved selection.
    pub fn selection(&self) -> Selection {
        self.inner.selection.borrow().clone()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl core::fmt::Debug for Observer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observer")
            .field("connection", &self.inner.conn_key.get())
            .field("active", &self.inner.active.get())
            .field("selection", &*self.inner.selection.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj<const N: usize>(entries: [(&str, JsonbValue); N]) -> JsonbValue {
        entries.into_iter().collect()
    }

    fn make_provider() -> Provider {
        Provider::new(obj([("a", obj([("b", obj([("c", 1i64.into()), ("d", 2i64.into())]))]))]))
    }

    fn counter(observer: &Observer) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        observer.subscribe(move |_| *count_clone.borrow_mut() += 1);
        count
    }

    #[test]
    fn test_data_keys_follow_selector() {
        let provider = make_provider();
        let observer = provider
            .observe(SelectorMap::new().with("val", "a.b.c").with("missing", "x.y"))
            .unwrap();
        let data = observer.data().unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["val", "missing"]);
        assert_eq!(data.get("val"), Some(&JsonbValue::Number(1.0)));
        assert!(data.contains_key("missing"));
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn test_connection_is_cached() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("v", "a")).unwrap();
        let id = observer.connection_id().unwrap();
        observer.set_state(&obj([("z", 1i64.into())])).unwrap();
        assert_eq!(observer.connection_id(), Some(id));
        assert_eq!(provider.connection_count(), 1);
    }

    #[test]
    fn test_callback_only_on_own_slice() {
        let provider = make_provider();
        let x = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        let y = provider.observe(SelectorMap::new().with("val", "a.b.d")).unwrap();
        let x_count = counter(&x);
        let y_count = counter(&y);

        y.set_state(&obj([("a", obj([("b", obj([("c", 5i64.into())]))]))]))
            .unwrap();
        assert_eq!(*x_count.borrow(), 1);
        assert_eq!(*y_count.borrow(), 0);
        assert_eq!(x.data().unwrap().get("val"), Some(&JsonbValue::Number(5.0)));
    }

    #[test]
    fn test_mixed_selection_refreshes_on_unrelated_write() {
        let provider = make_provider();
        let observer = provider
            .observe(SelectorMap::new().with("state", "@@STATE").with("val", "a.b.c"))
            .unwrap();
        let count = counter(&observer);

        provider.set_state(&obj([("q", true.into())])).unwrap();
        assert_eq!(*count.borrow(), 1);
        let data = observer.data().unwrap();
        assert!(data.get("state").unwrap().has_path(&PropertyPath::parse("q").unwrap()));
        assert_eq!(data.get("val"), Some(&JsonbValue::Number(1.0)));
    }

    #[test]
    fn test_reset_state_default_uses_selection() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        provider
            .set_state(&obj([("a", obj([("b", obj([("c", 7i64.into()), ("d", 8i64.into())]))]))]))
            .unwrap();

        let changes = observer.reset_state(None).unwrap();
        assert_eq!(changes.len(), 1);
        let state = provider.get_state().unwrap();
        assert_eq!(state.get_path(&PropertyPath::parse("a.b.c").unwrap()), Some(&JsonbValue::Number(1.0)));
        assert_eq!(state.get_path(&PropertyPath::parse("a.b.d").unwrap()), Some(&JsonbValue::Number(8.0)));
    }

    #[test]
    fn test_reset_state_empty_selection_is_noop() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new()).unwrap();
        provider.set_state(&obj([("e", 1i64.into())])).unwrap();
        assert!(observer.reset_state(None).unwrap().is_empty());
        assert!(observer.data().unwrap().is_empty());
    }

    #[test]
    fn test_close_tears_down() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        assert_eq!(provider.observer_count(), 1);

        observer.close();
        assert!(!observer.is_active());
        assert_eq!(observer.connection_id(), None);
        assert_eq!(provider.observer_count(), 0);
        assert_eq!(provider.connection_count(), 0);
        assert!(observer.data().unwrap_err().is_usage());
        assert!(observer.set_state(&JsonbValue::Null).unwrap_err().is_usage());
        observer.close();
    }

    #[test]
    fn test_reselect_same_paths_keeps_connection() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        let id = observer.connection_id();

        observer.reselect(SelectorMap::new().with("renamed", "a.b['c']")).unwrap();
        assert_eq!(observer.connection_id(), id);
        assert_eq!(observer.data().unwrap().get("renamed"), Some(&JsonbValue::Number(1.0)));
        assert!(!observer.data().unwrap().contains_key("val"));
    }

    #[test]
    fn test_reselect_new_paths_reconnects() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        let count = counter(&observer);
        let id = observer.connection_id();

        observer.reselect(SelectorMap::new().with("val", "a.b.d")).unwrap();
        assert_ne!(observer.connection_id(), id);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(provider.connection_count(), 1);
        assert_eq!(observer.data().unwrap().get("val"), Some(&JsonbValue::Number(2.0)));
    }

    #[test]
    fn test_reselect_invalid_keeps_old_selection() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        assert!(observer.reselect(SelectorMap::new().with("val", "a..b")).is_err());
        assert!(observer.is_active());
        assert_eq!(observer.data().unwrap().get("val"), Some(&JsonbValue::Number(1.0)));
    }

    #[test]
    fn test_reselect_after_close_reactivates() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        observer.close();
        observer.reselect(SelectorMap::new().with("val", "a.b.c")).unwrap();
        assert!(observer.is_active());
        assert_eq!(provider.observer_count(), 1);
    }

    #[test]
    fn test_drop_tears_down() {
        let provider = make_provider();
        {
            let _observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
            assert_eq!(provider.connection_count(), 1);
        }
        assert_eq!(provider.connection_count(), 0);
        assert_eq!(provider.observer_count(), 0);
    }

    #[test]
    fn test_operations_after_provider_close() {
        let provider = make_provider();
        let observer = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
        provider.close();
        assert!(observer.data().unwrap_err().is_usage());
        assert!(observer.set_state(&JsonbValue::Null).unwrap_err().is_usage());
        assert!(observer.reset_state(None).unwrap_err().is_usage());
        assert!(observer.reselect(SelectorMap::new()).unwrap_err().is_usage());
        observer.close();
    }
}
