//! Autosave Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures of the save path itself are
//! never returned from here: they are reported through
//! [`SaveStatus`](crate::SaveStatus). These errors are about using the
//! coordinator wrongly.

use crate::status::{Action, SaveStatus};
use derive_more::{Display, Error};

/// An autosave error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for autosave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required collaborator is missing or a setting is unusable. Fix the
    /// setup; this never goes away on its own.
    #[display("invalid autosave configuration: {_0}")]
    Configuration(#[error(not(source))] &'static str),
    /// The action isn't offered in the session's current status.
    #[display("cannot {action} while {status}")]
    InvalidAction { action: Action, status: SaveStatus },
    /// The session has been closed.
    #[display("editing session is closed")]
    Closed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
