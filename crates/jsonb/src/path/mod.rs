//! Property path module for state tree addressing.

pub mod eval;
pub mod parser;

pub use eval::MAX_ARRAY_GAP;
pub use parser::{array_index, ParseError, PropertyPath, FULL_STATE_SELECTOR, GLOBAL_SELECTOR};
