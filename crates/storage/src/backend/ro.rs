//! Read-only storage backend.
//!
//! Wraps another backend, passes reads through, and drops writes while still
//! reporting success.

use async_trait::async_trait;

use crate::{BackendHandle, StorageBackend, error::Result};

/// Read-only storage backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event). Useful for inspecting a device store
/// without letting anything (including schema migration) touch it.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.read_all(key).await
    }

    async fn write_all(&self, key: &str, data: &[u8]) -> Result<()> {
        tracing::info!(key, bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_through_writes_dropped() {
        let inner = Arc::new(MockBackend::with_entries([("k", b"original".to_vec())]));
        let ro = ReadOnlyBackend::new(inner.clone());
        assert_eq!(ro.read_all("k").await.unwrap().as_deref(), Some(&b"original"[..]));
        ro.write_all("k", b"changed").await.unwrap();
        assert_eq!(inner.read_all("k").await.unwrap().as_deref(), Some(&b"original"[..]));
    }
}
