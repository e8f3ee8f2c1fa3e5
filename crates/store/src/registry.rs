//! Connection registry.
//!
//! Interns the connections a provider hands to its observers, keyed by
//! connection instance id. Connections are shared out as `Rc` so callers
//! never hold a borrow of the registry while using one.

use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use strata_core::ClientId;
use strata_storage::Connection;

/// Connections owned by one provider.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ClientId, Rc<Connection>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its shared handle.
    pub fn insert(&mut self, connection: Connection) -> Rc<Connection> {
        let connection = Rc::new(connection);
        self.connections
            .insert(connection.instance_id(), connection.clone());
        connection
    }

    /// Returns the connection registered under `id`.
    pub fn get(&self, id: ClientId) -> Option<Rc<Connection>> {
        self.connections.get(&id).cloned()
    }

    /// Removes the connection registered under `id`.
    pub fn remove(&mut self, id: ClientId) -> Option<Rc<Connection>> {
        self.connections.remove(&id)
    }

    /// Returns true if `id` is registered.
    #[inline]
    pub fn contains(&self, id: ClientId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Returns the number of registered connections.
    #[inline]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Removes every connection and returns them.
    pub fn drain(&mut self) -> Vec<Rc<Connection>> {
        self.connections.drain().map(|(_, conn)| conn).collect()
    }
}
