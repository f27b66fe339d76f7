//! CLI Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration could not be loaded; fix the file or environment.
    #[display("configuration error")]
    Config,
    /// The device store could not be opened.
    #[display("cannot open local storage at {_0}")]
    Storage(#[error(not(source))] String),
    /// Script content could not be read from the given input.
    #[display("cannot read script from {_0}")]
    Input(#[error(not(source))] String),
    /// A command-line value is malformed.
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    /// The requested revision does not exist.
    #[display("no revision with id {_0}")]
    NotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
