//! Per-observer connections into a state container.

use crate::immutable::{self, CoreRef, ImmutableCore, PendingUnlinks};
use alloc::rc::Weak;
use core::cell::{Cell, RefCell};
use strata_core::{ClientId, Error, Result};
use strata_jsonb::{JsonbValue, PropertyPath};
use strata_reactive::{ChangeSet, Snapshot};
use tracing::debug;

/// Handle one observer uses to read and write a container.
///
/// The instance id doubles as the client id the accessor cache tracks. A
/// connection does not keep its container alive. Dropping it disconnects.
pub struct Connection {
    id: ClientId,
    core: Weak<RefCell<ImmutableCore>>,
    pending: PendingUnlinks,
    disconnected: Cell<bool>,
}

impl Connection {
    pub(crate) fn new(
        id: ClientId,
        core: Weak<RefCell<ImmutableCore>>,
        pending: PendingUnlinks,
    ) -> Self {
        Self {
            id,
            core,
            pending,
            disconnected: Cell::new(false),
        }
    }

    /// Returns the process-unique instance id.
    #[inline]
    pub fn instance_id(&self) -> ClientId {
        self.id
    }

    /// Returns true until the connection is disconnected or its container
    /// closes or goes away.
    pub fn is_connected(&self) -> bool {
        if self.disconnected.get() {
            return false;
        }
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        let closed = core.borrow().is_closed();
        !closed
    }

    fn live(&self) -> Result<CoreRef> {
        if self.disconnected.get() {
            return Err(Error::usage("the connection was disconnected"));
        }
        let core = self
            .core
            .upgrade()
            .ok_or_else(|| Error::usage("the state container no longer exists"))?;
        core.borrow().ensure_open()?;
        Ok(core)
    }

    /// Reads the current values at `paths`, registering this connection as
    /// a client of their accessor.
    pub fn get(&self, paths: &[PropertyPath]) -> Result<Snapshot> {
        let core = self.live()?;
        let snapshot = core.borrow_mut().cache_mut().get(self.id, paths);
        Ok(snapshot)
    }

    /// Clears the refresh flag of the accessor for `paths`, once the caller
    /// has re-derived its data. Returns whether it was due.
    pub fn mark_refreshed(&self, paths: &[PropertyPath]) -> Result<bool> {
        let core = self.live()?;
        let due = core.borrow_mut().cache_mut().mark_refreshed(paths);
        Ok(due)
    }

    /// Deep-merges `patch` into the state tree.
    pub fn set(&self, patch: &JsonbValue) -> Result<ChangeSet> {
        let core = self.live()?;
        immutable::commit(&core, |state| immutable::merge(state, patch))
    }

    /// Writes each `(path, Some(value))` and removes each `(path, None)`.
    pub fn replace(&self, entries: &[(PropertyPath, Option<JsonbValue>)]) -> Result<ChangeSet> {
        let core = self.live()?;
        immutable::commit(&core, |state| immutable::replace(state, entries))
    }

    /// Unregisters this connection from every accessor it reads through.
    ///
    /// If the container is borrowed, the unlink is queued and applied on its
    /// next mutable access. Idempotent.
    pub fn disconnect(&self) {
        if self.disconnected.replace(true) {
            return;
        }
        if let Some(core) = self.core.upgrade() {
            match core.try_borrow_mut() {
                Ok(mut core) => core.cache_mut().unlink_client(self.id),
                Err(_) => self.pending.borrow_mut().push(self.id),
            }
        }
        debug!(connection = self.id, "connection disconnected");
    }

    /// Returns true once `disconnect` has run.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.get()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl core::fmt::Debug for Connection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("disconnected", &self.disconnected.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Immutable;
    use strata_jsonb::{JsonbValue, PropertyPath};

    fn path(s: &str) -> PropertyPath {
        PropertyPath::parse(s).unwrap()
    }

    fn make_container() -> Immutable {
        let b: JsonbValue = [("c", JsonbValue::from(1i64)), ("d", JsonbValue::from(2i64))]
            .into_iter()
            .collect();
        let a: JsonbValue = [("b", b)].into_iter().collect();
        Immutable::new([("a", a)].into_iter().collect())
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let container = make_container();
        let c1 = container.connect().unwrap();
        let c2 = container.connect().unwrap();
        assert_ne!(c1.instance_id(), c2.instance_id());
        assert!(c1.is_connected());
    }

    #[test]
    fn test_get_registers_client() {
        let container = make_container();
        let conn = container.connect().unwrap();
        let snapshot = conn.get(&[path("a.b.c")]).unwrap();
        assert_eq!(snapshot.value(&path("a.b.c")), Some(&JsonbValue::Number(1.0)));
        assert_eq!(container.accessor_count(), 1);
        assert_eq!(container.atom_count(), 1);
    }

    #[test]
    fn test_disconnect_releases_cache() {
        let container = make_container();
        let c1 = container.connect().unwrap();
        let c2 = container.connect().unwrap();
        c1.get(&[path("a.b.c")]).unwrap();
        c2.get(&[path("a.b.c")]).unwrap();

        c1.disconnect();
        assert_eq!(container.accessor_count(), 1);
        c1.disconnect();
        assert_eq!(container.accessor_count(), 1);
        c2.disconnect();
        assert_eq!(container.accessor_count(), 0);
        assert_eq!(container.atom_count(), 0);
    }

    #[test]
    fn test_drop_disconnects() {
        let container = make_container();
        {
            let conn = container.connect().unwrap();
            conn.get(&[path("a")]).unwrap();
            assert_eq!(container.accessor_count(), 1);
        }
        assert_eq!(container.accessor_count(), 0);
    }

    #[test]
    fn test_operations_after_disconnect_fail() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.disconnect();
        assert!(conn.is_disconnected());
        assert!(!conn.is_connected());
        assert!(conn.get(&[path("a")]).unwrap_err().is_usage());
        assert!(conn.set(&JsonbValue::Null).unwrap_err().is_usage());
        assert!(conn.replace(&[]).unwrap_err().is_usage());
    }

    #[test]
    fn test_operations_after_container_dropped_fail() {
        let conn = make_container().connect().unwrap();
        assert!(!conn.is_connected());
        assert!(conn.get(&[path("a")]).unwrap_err().is_usage());
        conn.disconnect();
    }

    #[test]
    fn test_mark_refreshed_after_write() {
        let container = make_container();
        let conn = container.connect().unwrap();
        conn.get(&[path("a.b.c")]).unwrap();
        let b: JsonbValue = [("c", JsonbValue::from(2i64))].into_iter().collect();
        let a: JsonbValue = [("b", b)].into_iter().collect();
        conn.set(&[("a", a)].into_iter().collect()).unwrap();

        assert!(container.is_refresh_due(&[path("a.b.c")]));
        assert!(conn.mark_refreshed(&[path("a.b.c")]).unwrap());
        assert!(!container.is_refresh_due(&[path("a.b.c")]));
    }

    #[test]
    fn test_set_through_connection() {
        let container = make_container();
        let conn = container.connect().unwrap();
        let patch: JsonbValue = [("x", JsonbValue::from(true))].into_iter().collect();
        let changes = conn.set(&patch).unwrap();
        assert!(changes.contains(&path("x")));
        assert!(conn.set(&patch).unwrap().is_empty());
    }
}
