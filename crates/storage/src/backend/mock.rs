//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Values are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Reads and writes
/// can be made to fail on demand to simulate an unavailable device store.
///
/// # Examples
///
/// ```
/// use draftcast_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_entries([("script-revisions", b"[]".to_vec())]);
/// assert!(backend.read_all("script-revisions").await?.is_some());
///
/// backend.fail_reads(true);
/// assert!(backend.read_all("script-revisions").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    storage: RwLock<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with values.
    ///
    /// # Panics
    ///
    /// On a key that fails validation.
    pub fn with_entries(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (key, data) in entries {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                panic!("MockBackend::with_entries: invalid key {key}");
            };
            map.insert(validated, data.into());
        }
        Self {
            storage: RwLock::new(map),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `key`, bypassing failure injection.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.read().await.get(key).cloned()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let entries: [(&str, Vec<u8>); 0] = [];
        Self::with_entries(entries)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = validate_key(key)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError(format!("injected read failure: {key}")));
        }
        Ok(self.storage.read().await.get(&key).cloned())
    }

    async fn write_all(&self, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError(format!("injected write failure: {key}")));
        }
        self.storage.write().await.insert(key, data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write_all("test", b"hello").await.unwrap();
        assert_eq!(backend.read_all("test").await.unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_with_entries() {
        let backend = MockBackend::with_entries([("a/one", b"1".to_vec()), ("b/two", b"2".to_vec())]);
        assert!(backend.read_all("a/one").await.unwrap().is_some());
        assert!(backend.read_all("c/nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MockBackend::with_entries([("k", b"v".to_vec())]);
        backend.fail_reads(true);
        let err = backend.read_all("k").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        backend.fail_reads(false);
        assert!(backend.read_all("k").await.unwrap().is_some());

        backend.fail_writes(true);
        assert!(backend.write_all("k", b"new").await.is_err());
        assert_eq!(backend.peek("k").await.as_deref(), Some(&b"v"[..]));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_key_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read_all("../etc/passwd").await.is_err());
        assert!(backend.write_all("../escape", b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_entries_panics_on_bad_key() {
        MockBackend::with_entries([("../escape", b"bad".to_vec())]);
    }
}
