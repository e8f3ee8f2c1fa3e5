//! Strata Store - Selective observers over a shared state tree.
//!
//! This crate is the observer-facing layer of Strata:
//!
//! - `Provider`: Owns one state tree, its initial copy for resets, the
//!   prehooks and the connections handed to observers
//! - `ProviderBuilder`: Builder-style provider configuration
//! - `Observer`: Reads the slices a `SelectorMap` declares and runs its
//!   callbacks only when one of them changes
//! - `Prehooks`: Optional vetoes consulted before writes
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use strata_jsonb::JsonbValue;
//! use strata_store::{Provider, SelectorMap};
//!
//! let b: JsonbValue = [("c", JsonbValue::from(1i64)), ("d", JsonbValue::from(2i64))]
//!     .into_iter()
//!     .collect();
//! let a: JsonbValue = [("b", b)].into_iter().collect();
//! let provider = Provider::new([("a", a)].into_iter().collect());
//!
//! let x = provider.observe(SelectorMap::new().with("val", "a.b.c")).unwrap();
//! let y = provider.observe(SelectorMap::new().with("val", "a.b.d")).unwrap();
//!
//! let y_calls = Rc::new(Cell::new(0));
//! let counter = y_calls.clone();
//! y.subscribe(move |_| counter.set(counter.get() + 1));
//!
//! let c: JsonbValue = [("c", JsonbValue::from(5i64))].into_iter().collect();
//! let b: JsonbValue = [("b", c)].into_iter().collect();
//! x.set_state(&[("a", b)].into_iter().collect()).unwrap();
//!
//! assert_eq!(x.data().unwrap().get("val"), Some(&JsonbValue::from(5i64)));
//! assert_eq!(y.data().unwrap().get("val"), Some(&JsonbValue::from(2i64)));
//! assert_eq!(y_calls.get(), 0);
//! ```

extern crate alloc;

pub mod observer;
pub mod prehooks;
pub mod provider;
pub mod registry;
pub mod selector;

pub use observer::{Data, Observer};
pub use prehooks::{Prehooks, ResetContext, ResetStateHook, SetStateHook};
pub use provider::{Provider, ProviderBuilder};
pub use registry::ConnectionRegistry;
pub use selector::{Selection, SelectorMap};

// Re-export commonly used types from dependencies
pub use strata_core::{Error, Result};
pub use strata_jsonb::{JsonbValue, PropertyPath};
pub use strata_reactive::ChangeSet;
pub use strata_storage::{ChangeEvent, MemoryStorage, Storage};
