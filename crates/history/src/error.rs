//! History Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. None of these reach callers of the
//! store's public operations: history failures are logged and absorbed.

use derive_more::{Display, Error};

/// A history error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for history operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The device store could not be read or written.
    #[display("storage error")]
    Storage,
    /// Serialization/deserialization error.
    #[display("invalid history data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// A document with a schema version this build does not understand.
    #[display("unsupported history schema version {_0}")]
    UnsupportedSchema(#[error(not(source))] u32),
    /// A revision identifier that isn't a UUID.
    #[display("invalid revision id: {_0}")]
    InvalidId(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
