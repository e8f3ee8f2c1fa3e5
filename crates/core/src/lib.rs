//! Strata Core - Core error and identifier types for Strata.
//!
//! This crate provides the foundational types shared by every Strata crate:
//!
//! - `Error`: Error taxonomy for store operations (usage errors, inconsistent
//!   selector maps, malformed property paths)
//! - `ClientId`: Identifier of a connection into a state container, also used
//!   as the client key inside the subscription cache
//!
//! # Example
//!
//! ```rust
//! use strata_core::{next_client_id, Error};
//!
//! let a = next_client_id();
//! let b = next_client_id();
//! assert!(b > a);
//!
//! let err = Error::usage("no provider mounted");
//! assert!(err.is_usage());
//! ```

#![no_std]

extern crate alloc;

mod error;
mod id;

pub use error::{Error, Result};
pub use id::{next_client_id, AccessorId, ClientId};
