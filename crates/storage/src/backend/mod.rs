//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a whole-value key-value
//! interface scoped to the device/user, plus the local filesystem and
//! read-only implementations (and an in-memory one for tests).

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use async_trait::async_trait;

/// Unified interface for device-local storage backends.
///
/// Values are opaque bytes, always read and written as a whole. Callers own
/// the encoding (and any schema versioning) of what they store.
///
/// # Key Handling
/// Keys are relative, slash-separated names and must be validated using
/// [`validate_key`](crate::validate_key) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use draftcast_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_history(backend: &dyn StorageBackend) -> Result<usize> {
///     Ok(backend.read_all("script-revisions.v2").await?.map(|data| data.len()).unwrap_or(0))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend. Used for logging only.
    fn name(&self) -> &str;

    /// Read the complete value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been written under that key yet;
    /// absence is not an error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use draftcast_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// match backend.read_all("script-revisions.v2").await? {
    ///     Some(data) => println!("Read {} bytes", data.len()),
    ///     None => println!("Nothing stored yet"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value stored under `key`.
    ///
    /// # Notes
    /// - Implementations should make the replacement atomic: a reader sees
    ///   either the previous value or the new one, never a torn write.
    ///
    /// ```no_run
    /// # use draftcast_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.write_all("script-revisions.v2", br#"{"version":2,"entries":[]}"#).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn write_all(&self, key: &str, data: &[u8]) -> Result<()>;
}
