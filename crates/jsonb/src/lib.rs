//! Strata JSONB - JSON state tree and property paths for Strata.
//!
//! This crate provides the value layer shared by the state container and the
//! subscription cache:
//!
//! - `JsonbValue`: The JSON value type with sorted object keys
//! - `PropertyPath`: Parsed, normalized dot/bracket property path
//! - Path evaluation (`get_path`, `set_path`, `remove_path`)
//! - `merge_patch`: Deep merge that reports the paths whose values changed
//!
//! # Example
//!
//! ```rust
//! use strata_jsonb::{JsonbValue, PropertyPath};
//!
//! let b: JsonbValue = [("c", JsonbValue::from(1i64))].into_iter().collect();
//! let a: JsonbValue = [("b", b)].into_iter().collect();
//! let state: JsonbValue = [("a", a)].into_iter().collect();
//!
//! let path = PropertyPath::parse("a.b.c").unwrap();
//! assert_eq!(state.get_path(&path), Some(&JsonbValue::Number(1.0)));
//!
//! // Bracket and dot indexing normalize to the same path
//! assert_eq!(
//!     PropertyPath::parse("x[1].y").unwrap(),
//!     PropertyPath::parse("x.1.y").unwrap()
//! );
//! ```

#![no_std]

extern crate alloc;

mod ops;
pub mod path;
mod value;

pub use path::{
    array_index, ParseError, PropertyPath, FULL_STATE_SELECTOR, GLOBAL_SELECTOR, MAX_ARRAY_GAP,
};
pub use value::{JsonbObject, JsonbValue};
