//! Identifier allocation for Strata.
//!
//! Connection ids are process-unique so that connections from different
//! containers never alias each other in logs or registries.

use core::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a connection (a "client" of the subscription cache).
pub type ClientId = u64;

/// Identifier of an accessor inside one subscription cache.
pub type AccessorId = u64;

/// Global client ID counter.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Gets the next unique client ID.
pub fn next_client_id() -> ClientId {
    NEXT_CLIENT_ID.fetch_add(1, Ordering::SeqCst)
}
