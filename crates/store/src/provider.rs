//! Store provider.
//!
//! A `Provider` owns one state container for its lifetime: the initial
//! state kept for resets, the prehooks, the connection registry and the
//! table of observers to refresh after a write.
//!
//! After every write the container reports which clients' accessors were
//! touched; the provider looks those clients up in its notifier table and
//! refreshes only the matching observers.

use crate::observer::Observer;
use crate::prehooks::{Prehooks, ResetContext};
use crate::registry::ConnectionRegistry;
use crate::selector::SelectorMap;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use strata_core::{next_client_id, ClientId, Error, Result};
use strata_jsonb::{JsonbValue, PropertyPath};
use strata_reactive::{ChangeSet, SubscriptionId};
use strata_storage::{ChangeEvent, Connection, Immutable, MemoryStorage, Storage};
use tracing::debug;

/// Refresh hook registered by an active observer.
pub(crate) type Notifier = Rc<dyn Fn()>;

/// Builder for a [`Provider`].
///
/// # Example
///
/// ```
/// use strata_jsonb::JsonbValue;
/// use strata_store::{Prehooks, ProviderBuilder};
///
/// let provider = ProviderBuilder::new()
///     .value([("count", JsonbValue::from(0i64))].into_iter().collect())
///     .prehooks(Prehooks::new().with_set_state(|patch| !patch.is_null()))
///     .storage_key("counter")
///     .build();
/// assert_eq!(provider.storage_key(), "counter");
/// ```
pub struct ProviderBuilder {
    value: JsonbValue,
    prehooks: Prehooks,
    storage: Option<Box<dyn Storage>>,
    storage_key: Option<String>,
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderBuilder {
    /// Creates a builder for an empty (`Null`) state tree.
    pub fn new() -> Self {
        Self {
            value: JsonbValue::Null,
            prehooks: Prehooks::new(),
            storage: None,
            storage_key: None,
        }
    }

    /// Sets the initial state tree.
    pub fn value(mut self, value: JsonbValue) -> Self {
        self.value = value;
        self
    }

    /// Sets the write prehooks.
    pub fn prehooks(mut self, prehooks: Prehooks) -> Self {
        self.prehooks = prehooks;
        self
    }

    /// Sets the backend holding the initial state. Defaults to
    /// [`MemoryStorage`].
    pub fn storage<S: Storage + 'static>(mut self, storage: S) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Sets the key the initial state is stored under. Defaults to a
    /// process-unique key.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Builds the provider, storing a copy of the initial state.
    pub fn build(self) -> Provider {
        let mut storage = self
            .storage
            .unwrap_or_else(|| Box::new(MemoryStorage::new()));
        let storage_key = self
            .storage_key
            .unwrap_or_else(|| format!("strata-provider-{}", next_client_id()));
        let original = storage.clone_value(&self.value);
        storage.set_item(&storage_key, original);

        let container = Immutable::new(self.value);
        let core = Rc::new(ProviderCore {
            container,
            connection: RefCell::new(None),
            registry: RefCell::new(ConnectionRegistry::new()),
            notifiers: RefCell::new(HashMap::new()),
            prehooks: RefCell::new(self.prehooks),
            storage: RefCell::new(storage),
            storage_key,
            closed: Cell::new(false),
        });

        let weak = Rc::downgrade(&core);
        let subscribed = core.container.subscribe(move |event| {
            if let Some(core) = weak.upgrade() {
                core.dispatch(event);
            }
        });
        if let Err(err) = subscribed {
            debug!(error = %err, "provider could not subscribe to its container");
        }
        debug!(storage_key = %core.storage_key, "provider mounted");
        Provider { core }
    }
}

pub(crate) struct ProviderCore {
    container: Immutable,
    /// The provider's own connection, opened on first use
    connection: RefCell<Option<Rc<Connection>>>,
    registry: RefCell<ConnectionRegistry>,
    /// Connection id -> refresh hook of the observer using it
    notifiers: RefCell<HashMap<ClientId, Notifier>>,
    prehooks: RefCell<Prehooks>,
    storage: RefCell<Box<dyn Storage>>,
    storage_key: String,
    closed: Cell<bool>,
}

impl ProviderCore {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::usage("the store provider is closed"));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Refreshes the observers whose accessors the write touched.
    fn dispatch(&self, event: &ChangeEvent) {
        let due: Vec<(ClientId, Notifier)> = {
            let notifiers = self.notifiers.borrow();
            event
                .due_clients
                .iter()
                .filter_map(|client| notifiers.get(client).map(|n| (*client, n.clone())))
                .collect()
        };
        for (client, notify) in due {
            // an earlier observer's callback may have torn this one down
            if self.notifiers.borrow().contains_key(&client) {
                notify();
            }
        }
    }

    /// Opens a connection and registers it.
    pub(crate) fn connect(&self) -> Result<Rc<Connection>> {
        self.ensure_open()?;
        let connection = self.container.connect()?;
        Ok(self.registry.borrow_mut().insert(connection))
    }

    pub(crate) fn registered(&self, id: ClientId) -> Option<Rc<Connection>> {
        self.registry.borrow().get(id)
    }

    pub(crate) fn unregister(&self, id: ClientId) -> Option<Rc<Connection>> {
        self.registry.borrow_mut().remove(id)
    }

    pub(crate) fn add_notifier(&self, id: ClientId, notifier: Notifier) {
        self.notifiers.borrow_mut().insert(id, notifier);
    }

    pub(crate) fn remove_notifier(&self, id: ClientId) -> bool {
        self.notifiers.borrow_mut().remove(&id).is_some()
    }

    fn own_connection(&self) -> Result<Rc<Connection>> {
        self.ensure_open()?;
        if let Some(conn) = self.connection.borrow().as_ref() {
            return Ok(conn.clone());
        }
        let conn = Rc::new(self.container.connect()?);
        *self.connection.borrow_mut() = Some(conn.clone());
        Ok(conn)
    }

    fn original(&self) -> JsonbValue {
        let storage = self.storage.borrow();
        let original = storage
            .get_item(&self.storage_key)
            .map(|value| storage.clone_value(&value));
        original.unwrap_or_default()
    }

    /// Deep-merges `patch` through `conn` unless a prehook vetoes it.
    pub(crate) fn set_state_via(&self, conn: &Connection, patch: &JsonbValue) -> Result<ChangeSet> {
        self.ensure_open()?;
        let hook = self.prehooks.borrow().set_state_hook();
        if let Some(hook) = hook {
            if !hook(patch) {
                debug!("set_state vetoed by prehook");
                return Ok(ChangeSet::new());
            }
        }
        conn.set(patch)
    }

    /// Restores `paths` to their initial values through `conn`, deleting
    /// paths absent from the initial state.
    pub(crate) fn reset_state_via(&self, conn: &Connection, paths: &[PropertyPath]) -> Result<ChangeSet> {
        self.ensure_open()?;
        if paths.is_empty() {
            return Ok(ChangeSet::new());
        }
        let original = self.original();
        let entries: Vec<(PropertyPath, Option<JsonbValue>)> = if paths.iter().any(PropertyPath::is_global) {
            alloc::vec![(PropertyPath::global(), Some(original.clone()))]
        } else {
            paths
                .iter()
                .map(|path| (path.clone(), original.get_path(path).cloned()))
                .collect()
        };

        let hook = self.prehooks.borrow().reset_state_hook();
        if let Some(hook) = hook {
            let current = self.container.get_state()?;
            let context = ResetContext {
                current: &current,
                original: &original,
            };
            if !hook(&entries, &context) {
                debug!("reset_state vetoed by prehook");
                return Ok(ChangeSet::new());
            }
        }
        conn.replace(&entries)
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.notifiers.borrow_mut().clear();
        let connections = self.registry.borrow_mut().drain();
        for conn in connections {
            conn.disconnect();
        }
        if let Some(conn) = self.connection.borrow_mut().take() {
            conn.disconnect();
        }
        self.container.close();
        self.storage.borrow_mut().remove_item(&self.storage_key);
        debug!(storage_key = %self.storage_key, "provider closed");
    }
}

impl Drop for ProviderCore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Store provider for one state tree.
///
/// Cloning yields another handle to the same provider. The provider closes
/// when [`Provider::close`] is called or the last handle is dropped.
///
/// # Example
///
/// ```
/// use strata_jsonb::JsonbValue;
/// use strata_store::{Provider, SelectorMap};
///
/// let provider = Provider::new([("count", JsonbValue::from(1i64))].into_iter().collect());
/// let observer = provider.observe(SelectorMap::new().with("n", "count")).unwrap();
/// assert_eq!(observer.data().unwrap().get("n"), Some(&JsonbValue::from(1i64)));
///
/// provider
///     .set_state(&[("count", JsonbValue::from(2i64))].into_iter().collect())
///     .unwrap();
/// assert_eq!(observer.data().unwrap().get("n"), Some(&JsonbValue::from(2i64)));
/// ```
#[derive(Clone)]
pub struct Provider {
    core: Rc<ProviderCore>,
}

impl Provider {
    /// Creates a provider over `value` with default configuration.
    pub fn new(value: JsonbValue) -> Self {
        ProviderBuilder::new().value(value).build()
    }

    /// Returns a builder.
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::new()
    }

    pub(crate) fn core(&self) -> &Rc<ProviderCore> {
        &self.core
    }

    /// Creates an observer over the slices `selector` declares.
    pub fn observe(&self, selector: SelectorMap) -> Result<Observer> {
        Observer::new(self, selector)
    }

    /// Returns a copy of the whole state tree.
    ///
    /// Reads the container directly: the provider is not an observer and
    /// registers no accessor.
    pub fn get_state(&self) -> Result<JsonbValue> {
        self.core.ensure_open()?;
        self.core.container.get_state()
    }

    /// Deep-merges `patch` into the state tree.
    pub fn set_state(&self, patch: &JsonbValue) -> Result<ChangeSet> {
        let conn = self.core.own_connection()?;
        self.core.set_state_via(&conn, patch)
    }

    /// Restores `paths` to their initial values. `None` resets the whole
    /// tree.
    pub fn reset_state(&self, paths: Option<&[PropertyPath]>) -> Result<ChangeSet> {
        let conn = self.core.own_connection()?;
        match paths {
            Some(paths) => self.core.reset_state_via(&conn, paths),
            None => self
                .core
                .reset_state_via(&conn, core::slice::from_ref(&PropertyPath::global())),
        }
    }

    /// Applies a new provider value as a deep-merge patch.
    pub fn update_value(&self, value: &JsonbValue) -> Result<ChangeSet> {
        self.set_state(value)
    }

    /// Registers a listener invoked after every write that changed the tree.
    pub fn subscribe<F>(&self, listener: F) -> Result<SubscriptionId>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.core.ensure_open()?;
        self.core.container.subscribe(listener)
    }

    /// Removes a listener. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.container.unsubscribe(id)
    }

    /// Replaces the write prehooks.
    pub fn set_prehooks(&self, prehooks: Prehooks) {
        *self.core.prehooks.borrow_mut() = prehooks;
    }

    /// Closes the provider: disconnects every observer, closes the
    /// container and removes the stored initial state. Idempotent.
    pub fn close(&self) {
        self.core.close();
    }

    /// Returns true once the provider is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Returns the key the initial state is stored under.
    #[inline]
    pub fn storage_key(&self) -> &str {
        &self.core.storage_key
    }

    /// Returns the number of connections handed to observers.
    pub fn connection_count(&self) -> usize {
        self.core.registry.borrow().len()
    }

    /// Returns the number of observers awaiting refreshes.
    pub fn observer_count(&self) -> usize {
        self.core.notifiers.borrow().len()
    }

    /// Returns the number of live accessors.
    pub fn accessor_count(&self) -> usize {
        self.core.container.accessor_count()
    }

    /// Returns the number of live value cells.
    pub fn atom_count(&self) -> usize {
        self.core.container.atom_count()
    }

    /// Returns true if the accessor for `paths` is due for a refresh.
    pub fn is_refresh_due(&self, paths: &[PropertyPath]) -> bool {
        self.core.container.is_refresh_due(paths)
    }
}
