//! Accessors: shared views over one path-set.
//!
//! Every distinct ordered path-set requested from the cache is represented by
//! exactly one `Accessor`, however many clients use it. The accessor tracks
//! its clients and whether a write has made its snapshot stale.

use crate::atom::Atom;
use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use strata_core::{AccessorId, ClientId};
use strata_jsonb::{JsonbValue, PropertyPath};

/// Values read through an accessor, keyed by watched path.
///
/// The global path is keyed by its canonical form `@@GLOBAL`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(PropertyPath, Option<Rc<JsonbValue>>)>,
}

impl Snapshot {
    /// Returns the value at `path`, or `None` if the path is missing from the
    /// state tree or not part of this snapshot.
    pub fn value(&self, path: &PropertyPath) -> Option<&JsonbValue> {
        self.shared(path).map(|v| v.as_ref())
    }

    /// Returns the shared value handle at `path`.
    pub fn shared(&self, path: &PropertyPath) -> Option<&Rc<JsonbValue>> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Returns the value by canonical path string.
    pub fn get(&self, key: &str) -> Option<&JsonbValue> {
        self.entries
            .iter()
            .find(|(p, _)| p.as_str() == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Returns true if `path` is part of this snapshot.
    pub fn contains(&self, path: &PropertyPath) -> bool {
        self.entries.iter().any(|(p, _)| p == path)
    }

    /// Returns an iterator over (path, value) pairs in watch order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyPath, Option<&Rc<JsonbValue>>)> {
        self.entries.iter().map(|(p, v)| (p, v.as_ref()))
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A shared view over one ordered set of property paths.
#[derive(Debug)]
pub struct Accessor {
    id: AccessorId,
    paths: Vec<PropertyPath>,
    clients: HashSet<ClientId>,
    refresh_due: bool,
}

impl Accessor {
    /// Creates an accessor over `paths`.
    ///
    /// An empty path list watches the whole tree.
    pub fn new(id: AccessorId, paths: Vec<PropertyPath>) -> Self {
        let paths = if paths.is_empty() {
            alloc::vec![PropertyPath::global()]
        } else {
            paths
        };
        Self {
            id,
            paths,
            clients: HashSet::new(),
            refresh_due: false,
        }
    }

    /// Returns the accessor ID.
    #[inline]
    pub fn id(&self) -> AccessorId {
        self.id
    }

    /// Returns the watched paths in declaration order.
    #[inline]
    pub fn paths(&self) -> &[PropertyPath] {
        &self.paths
    }

    /// Returns true if the first watched path is the whole tree, in which
    /// case any write makes this accessor due.
    #[inline]
    pub fn watches_global(&self) -> bool {
        self.paths.first().map(PropertyPath::is_global).unwrap_or(false)
    }

    /// Adds a client. Returns true if it was not already present.
    pub fn add_client(&mut self, id: ClientId) -> bool {
        self.clients.insert(id)
    }

    /// Removes a client. Returns true if the client set is now empty.
    ///
    /// Removing an absent client leaves the set unchanged.
    pub fn remove_client(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id);
        self.clients.is_empty()
    }

    /// Returns true if `id` is a client.
    #[inline]
    pub fn has_client(&self, id: ClientId) -> bool {
        self.clients.contains(&id)
    }

    /// Returns the number of clients.
    #[inline]
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Returns an iterator over the clients.
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.iter().copied()
    }

    /// Returns true if a write touched this accessor since a client last
    /// re-derived its data.
    #[inline]
    pub fn refresh_due(&self) -> bool {
        self.refresh_due
    }

    #[inline]
    pub(crate) fn set_refresh_due(&mut self, due: bool) {
        self.refresh_due = due;
    }

    /// Builds the current snapshot from the shared atom pool.
    ///
    /// Read-only: does not touch the refresh flag.
    pub fn refresh_value(&self, atoms: &HashMap<PropertyPath, Atom>) -> Snapshot {
        let entries = self
            .paths
            .iter()
            .map(|path| {
                let value = atoms.get(path).and_then(|atom| atom.value().cloned());
                (path.clone(), value)
            })
            .collect();
        Snapshot { entries }
    }
}
