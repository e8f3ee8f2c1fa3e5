//! Strata Storage - State container layer for Strata.
//!
//! This crate provides the container that owns one state tree:
//!
//! - `Immutable`: Applies writes, runs change routing and notifies listeners
//! - `Connection`: Per-observer handle for reads and writes
//! - `ChangeEvent`: What listeners receive after a write
//! - `Storage`: Backend keeping a provider's initial state for resets
//!
//! # Example
//!
//! ```rust
//! use strata_jsonb::{JsonbValue, PropertyPath};
//! use strata_storage::Immutable;
//!
//! let state: JsonbValue = [("count", JsonbValue::from(1i64))].into_iter().collect();
//! let container = Immutable::new(state);
//! let conn = container.connect().unwrap();
//!
//! let count = PropertyPath::parse("count").unwrap();
//! assert_eq!(conn.get(&[count.clone()]).unwrap().value(&count), Some(&JsonbValue::from(1i64)));
//!
//! let patch: JsonbValue = [("count", JsonbValue::from(2i64))].into_iter().collect();
//! let changes = conn.set(&patch).unwrap();
//! assert!(changes.contains(&count));
//!
//! conn.disconnect();
//! container.close();
//! assert!(container.connect().is_err());
//! ```

extern crate alloc;

pub mod connection;
pub mod immutable;
pub mod storage;

pub use connection::Connection;
pub use immutable::{ChangeEvent, Immutable};
pub use storage::{MemoryStorage, Storage};
