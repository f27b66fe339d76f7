//! Local filesystem storage backend.
//!
//! Each key maps to one file below a configured root directory. Writes go to
//! a sibling temporary file first and are renamed into place, so a crash
//! mid-write leaves the previous value intact.

use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, key::validate as validate_key};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

const TEMP_SUFFIX: &str = ".partial";

/// Local filesystem storage backend.
///
/// All keys are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use draftcast_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("device", "/home/me/.local/share/draftcast")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Open a store rooted at `root`, creating the directory when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root.display().to_string()));
            }
        } else {
            // Blocking is fine: construction happens once, before any session starts.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Resolve a validated key below the root.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let abs_path = self.absolute_path(key)?;
        match fs::read(&abs_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, key)),
        }
    }

    async fn write_all(&self, key: &str, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        let temp = Self::temp_path(&abs_path);
        fs::write(&temp, data).await.map_err(|e| Self::map_io_error(e, key))?;
        if let Err(e) = fs::rename(&temp, &abs_path).await {
            // Best effort; the stale partial file is overwritten next time anyway.
            _ = fs::remove_file(&temp).await;
            exn::bail!(Self::map_io_error(e, key));
        }
        tracing::trace!(backend = %self.name, key, bytes = data.len(), "value written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/root");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalBackend::new("name", &file).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("history/script-revisions.v2");
        assert_eq!(backend.absolute_path("history/script-revisions.v2").unwrap(), expected);
        assert!(backend.absolute_path("../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write_all("test", b"Hello, world!").await.unwrap();
        assert_eq!(backend.read_all("test").await.unwrap().as_deref(), Some(&b"Hello, world!"[..]));
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert_eq!(backend.read_all("nothing-here").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_partial() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write_all("value", b"first").await.unwrap();
        backend.write_all("value", b"second").await.unwrap();
        assert_eq!(backend.read_all("value").await.unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!temp_dir.path().join("value.partial").exists());
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write_all("a/b/c/value", b"data").await.unwrap();
        assert!(temp_dir.path().join("a/b/c/value").is_file());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.write_all("../escape", b"bad").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
        assert!(backend.read_all("../escape").await.is_err());
    }
}
