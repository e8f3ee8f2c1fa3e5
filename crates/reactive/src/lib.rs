//! Strata Reactive - Selective subscription cache for Strata state trees.
//!
//! This crate decides which observers of a shared state tree must refresh
//! after a write, and keeps the caches that make that decision cheap.
//!
//! # Core Concepts
//!
//! - `Atom`: Value cell caching the last observed value at one property path,
//!   reference counted by the accessors using it
//! - `Accessor`: Shared view over one ordered path-set, tracking its clients
//!   and whether it is due for a refresh
//! - `AccessorCache`: Interns accessors by path-set, owns the atom pool and
//!   routes changed paths to the accessors they touch
//! - `ChangeSet`: The set of paths changed by one write
//! - `SubscriptionManager`: Listener registry used to fan out change events
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strata_jsonb::{JsonbValue, PropertyPath};
//! use strata_reactive::{AccessorCache, ChangeSet};
//!
//! let state: JsonbValue = [("count", JsonbValue::Number(1.0))].into_iter().collect();
//! let origin = Rc::new(RefCell::new(state));
//! let mut cache = AccessorCache::new(origin.clone());
//!
//! let count = PropertyPath::parse("count").unwrap();
//! let snapshot = cache.get(1, &[count.clone()]);
//! assert_eq!(snapshot.value(&count), Some(&JsonbValue::Number(1.0)));
//!
//! // A write reports its changed paths; only affected clients come back.
//! let changed = origin.borrow_mut().merge_patch(
//!     &[("count", JsonbValue::Number(2.0))].into_iter().collect(),
//! );
//! let due = cache.watch_source(&ChangeSet::from_paths(changed));
//! assert_eq!(due, vec![1]);
//! ```

extern crate alloc;

pub mod accessor;
pub mod atom;
pub mod cache;
pub mod change_set;
pub mod subscription;

pub use accessor::{Accessor, Snapshot};
pub use atom::Atom;
pub use cache::{AccessorCache, SharedState};
pub use change_set::ChangeSet;
pub use subscription::{ChangeCallback, SubscriptionId, SubscriptionManager};

// Re-export commonly used types from dependencies
pub use strata_core::{AccessorId, ClientId};
pub use strata_jsonb::{JsonbValue, PropertyPath};
