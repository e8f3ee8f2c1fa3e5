//! Error types for Strata.

use alloc::string::String;
use thiserror::Error;

/// Result type alias for Strata operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Strata store operations.
///
/// Cache bookkeeping never fails; every variant originates at a boundary
/// (connection acquisition, selector resolution, path parsing).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// A read, write or subscribe was attempted without an active provider
    /// or connection.
    #[error("Detected usage outside of an active store provider: {message}")]
    Usage { message: String },
    /// A selector map cannot be resolved unambiguously.
    #[error("Inconsistent selector map at key `{key}`: {message}")]
    InconsistentSelector { key: String, message: String },
    /// A property path could not be parsed.
    #[error("Invalid property path `{path}` at position {position}: {message}")]
    InvalidPath {
        path: String,
        position: usize,
        message: String,
    },
}

impl Error {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage {
            message: message.into(),
        }
    }

    /// Creates an inconsistent selector error.
    pub fn inconsistent_selector(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InconsistentSelector {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            position,
            message: message.into(),
        }
    }

    /// Returns true if this is a usage error.
    #[inline]
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage { .. })
    }
}
