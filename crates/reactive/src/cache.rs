//! Accessor cache and change routing.
//!
//! `AccessorCache` interns one `Accessor` per distinct path-set, owns the
//! pool of `Atom`s backing them and routes each write's `ChangeSet` to the
//! accessors it touches.
//!
//! Three indexes keep every operation proportional to the work it must do:
//!
//! - path -> accessors watching it, so a changed atom reaches its accessors
//!   without scanning the registry
//! - ancestor -> atoms below it, so a write finds the atoms under a replaced
//!   value without scanning the pool
//! - client -> accessors it uses, so unlinking a client never scans the
//!   registry either

use crate::accessor::{Accessor, Snapshot};
use crate::atom::Atom;
use crate::change_set::ChangeSet;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use strata_core::{AccessorId, ClientId};
use strata_jsonb::{JsonbValue, PropertyPath};
use tracing::{debug, trace};

/// State tree shared between a container and its cache.
pub type SharedState = Rc<RefCell<JsonbValue>>;

/// Registry of accessors and atoms for one state tree.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use strata_jsonb::{JsonbValue, PropertyPath};
/// use strata_reactive::AccessorCache;
///
/// let origin = Rc::new(RefCell::new(JsonbValue::Null));
/// let mut cache = AccessorCache::new(origin);
/// let a = PropertyPath::parse("a").unwrap();
///
/// cache.get(1, &[a.clone()]);
/// cache.get(2, &[a.clone(), a.clone()]);
/// assert_eq!(cache.accessor_count(), 1);
///
/// cache.unlink_client(1);
/// cache.unlink_client(2);
/// assert_eq!(cache.accessor_count(), 0);
/// assert_eq!(cache.atom_count(), 0);
/// ```
pub struct AccessorCache {
    /// Path-set signature -> accessor ID
    signatures: HashMap<Vec<PropertyPath>, AccessorId>,
    /// Accessor ID -> accessor
    accessors: HashMap<AccessorId, Accessor>,
    /// Path -> value cell
    atoms: HashMap<PropertyPath, Atom>,
    /// Path -> accessors watching it
    watchers: HashMap<PropertyPath, Vec<AccessorId>>,
    /// Path -> atoms strictly below it
    below: HashMap<PropertyPath, HashSet<PropertyPath>>,
    /// Client -> accessors it is registered with
    client_accessors: HashMap<ClientId, Vec<AccessorId>>,
    /// State tree the atoms are read from
    origin: SharedState,
    /// Next accessor ID to assign
    next_id: AccessorId,
}

/// Canonical signature: declaration order kept, duplicates dropped, empty
/// means the whole tree.
fn signature(paths: &[PropertyPath]) -> Vec<PropertyPath> {
    if paths.is_empty() {
        return alloc::vec![PropertyPath::global()];
    }
    let mut seen = HashSet::with_capacity(paths.len());
    paths
        .iter()
        .filter(|path| seen.insert(*path))
        .cloned()
        .collect()
}

fn read(origin: &JsonbValue, path: &PropertyPath) -> Option<Rc<JsonbValue>> {
    origin.get_path(path).cloned().map(Rc::new)
}

impl AccessorCache {
    /// Creates an empty cache over `origin`.
    pub fn new(origin: SharedState) -> Self {
        Self {
            signatures: HashMap::new(),
            accessors: HashMap::new(),
            atoms: HashMap::new(),
            watchers: HashMap::new(),
            below: HashMap::new(),
            client_accessors: HashMap::new(),
            origin,
            next_id: 1,
        }
    }

    /// Returns the state tree this cache reads from.
    #[inline]
    pub fn origin(&self) -> &SharedState {
        &self.origin
    }

    /// Returns the snapshot for `paths`, registering `client` with the
    /// accessor for that path-set and creating the accessor on first use.
    ///
    /// Repeated calls with the same client and path-set are idempotent. The
    /// refresh flag is left alone; see [`AccessorCache::mark_refreshed`].
    pub fn get(&mut self, client: ClientId, paths: &[PropertyPath]) -> Snapshot {
        let key = signature(paths);
        let id = match self.signatures.get(&key) {
            Some(&id) => id,
            None => self.create_accessor(key),
        };
        match self.accessors.get_mut(&id) {
            Some(accessor) => {
                if accessor.add_client(client) {
                    self.client_accessors.entry(client).or_default().push(id);
                }
                accessor.refresh_value(&self.atoms)
            }
            None => Snapshot::default(),
        }
    }

    fn create_accessor(&mut self, key: Vec<PropertyPath>) -> AccessorId {
        let id = self.next_id;
        self.next_id += 1;

        let origin = self.origin.borrow();
        for path in &key {
            if !self.atoms.contains_key(path) {
                self.atoms.insert(path.clone(), Atom::new(read(&origin, path)));
                for ancestor in path.ancestors() {
                    self.below.entry(ancestor).or_default().insert(path.clone());
                }
            }
            if let Some(atom) = self.atoms.get_mut(path) {
                atom.retain();
            }
            self.watchers.entry(path.clone()).or_default().push(id);
        }
        drop(origin);

        debug!(accessor = id, paths = key.len(), "accessor created");
        self.accessors.insert(id, Accessor::new(id, key.clone()));
        self.signatures.insert(key, id);
        id
    }

    /// Clears the refresh flag of the accessor for `paths` once a client has
    /// re-derived its data from it. Returns whether the accessor was due.
    pub fn mark_refreshed(&mut self, paths: &[PropertyPath]) -> bool {
        let Some(id) = self.signatures.get(&signature(paths)) else {
            return false;
        };
        match self.accessors.get_mut(id) {
            Some(accessor) => {
                let due = accessor.refresh_due();
                accessor.set_refresh_due(false);
                due
            }
            None => false,
        }
    }

    /// Removes `client` from every accessor it uses.
    ///
    /// Accessors left without clients are evicted together with every atom
    /// no other accessor holds. Unknown clients are a no-op.
    pub fn unlink_client(&mut self, client: ClientId) {
        let Some(ids) = self.client_accessors.remove(&client) else {
            return;
        };
        for id in ids {
            let emptied = self
                .accessors
                .get_mut(&id)
                .map(|accessor| accessor.remove_client(client))
                .unwrap_or(false);
            if emptied {
                self.evict(id);
            }
        }
    }

    fn evict(&mut self, id: AccessorId) {
        let Some(accessor) = self.accessors.remove(&id) else {
            return;
        };
        for path in accessor.paths() {
            if let Some(ids) = self.watchers.get_mut(path) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.watchers.remove(path);
                }
            }
            let remaining = self.atoms.get_mut(path).map(Atom::release).unwrap_or(0);
            if remaining == 0 {
                self.atoms.remove(path);
                for ancestor in path.ancestors() {
                    if let Some(paths) = self.below.get_mut(&ancestor) {
                        paths.remove(path);
                        if paths.is_empty() {
                            self.below.remove(&ancestor);
                        }
                    }
                }
            }
        }
        self.signatures.remove(accessor.paths());
        debug!(accessor = id, "accessor evicted");
    }

    /// Refreshes atoms touched by `changes` and marks their accessors due.
    ///
    /// Must run once per write, after the origin is updated and before any
    /// client reads. Returns the clients of every accessor this write
    /// touched, in ascending ID order; already-due accessors stay due.
    ///
    /// Cost follows the change set: the changed paths and their ancestors
    /// are looked up directly, descendants come from the ancestor index.
    pub fn watch_source(&mut self, changes: &ChangeSet) -> Vec<ClientId> {
        if changes.is_empty() {
            return Vec::new();
        }

        let mut targets: HashSet<PropertyPath> = changes
            .covered()
            .filter(|path| self.atoms.contains_key(*path))
            .cloned()
            .collect();
        for path in changes.paths() {
            if let Some(paths) = self.below.get(path) {
                targets.extend(paths.iter().cloned());
            }
        }

        let mut touched: Vec<AccessorId> = Vec::new();
        let mut seen = HashSet::new();
        let origin = self.origin.borrow();
        for path in &targets {
            if let Some(atom) = self.atoms.get_mut(path) {
                atom.set_value(read(&origin, path));
                trace!(path = %path, "atom refreshed");
            }
            if let Some(ids) = self.watchers.get(path) {
                touched.extend(ids.iter().copied().filter(|id| seen.insert(*id)));
            }
        }
        drop(origin);

        let mut clients = HashSet::new();
        for id in &touched {
            if let Some(accessor) = self.accessors.get_mut(id) {
                accessor.set_refresh_due(true);
                clients.extend(accessor.clients());
            }
        }
        let mut clients: Vec<ClientId> = clients.into_iter().collect();
        clients.sort_unstable();
        trace!(
            changed = changes.len(),
            accessors = touched.len(),
            clients = clients.len(),
            "change routed"
        );
        clients
    }

    /// Returns the current snapshot for `paths` without registering a client
    /// or touching the refresh flag. `None` if no accessor exists.
    pub fn refresh_value(&self, paths: &[PropertyPath]) -> Option<Snapshot> {
        let id = self.signatures.get(&signature(paths))?;
        self.accessors
            .get(id)
            .map(|accessor| accessor.refresh_value(&self.atoms))
    }

    /// Returns the accessor interned for `paths`.
    pub fn accessor(&self, paths: &[PropertyPath]) -> Option<&Accessor> {
        let id = self.signatures.get(&signature(paths))?;
        self.accessors.get(id)
    }

    /// Returns true if the accessor for `paths` exists and is due.
    pub fn is_refresh_due(&self, paths: &[PropertyPath]) -> bool {
        self.accessor(paths).map(Accessor::refresh_due).unwrap_or(false)
    }

    /// Returns the atom cached for `path`.
    #[inline]
    pub fn atom(&self, path: &PropertyPath) -> Option<&Atom> {
        self.atoms.get(path)
    }

    /// Returns the number of live accessors.
    #[inline]
    pub fn accessor_count(&self) -> usize {
        self.accessors.len()
    }

    /// Returns the number of live atoms.
    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Returns true if `client` is registered with any accessor.
    #[inline]
    pub fn has_client(&self, client: ClientId) -> bool {
        self.client_accessors.contains_key(&client)
    }

    /// Drops every accessor and atom.
    pub fn clear(&mut self) {
        self.signatures.clear();
        self.accessors.clear();
        self.atoms.clear();
        self.watchers.clear();
        self.below.clear();
        self.client_accessors.clear();
    }
}
