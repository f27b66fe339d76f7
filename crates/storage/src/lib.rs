//! Device-local key-value storage for draftcast.
//!
//! Everything the revision history keeps on the device goes through a
//! [`StorageBackend`]: whole values are read and written by key, nothing is
//! streamed or patched in place.

pub mod backend;
pub mod error;
mod key;

pub use crate::backend::StorageBackend;
pub use crate::key::validate as validate_key;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
