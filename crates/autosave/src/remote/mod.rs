//! Remote save service interface.
//!
//! The canonical project record lives behind a fallible network service. The
//! coordinator only ever pushes whole snapshots to it, optionally stating the
//! content hash it believes the remote currently holds.

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::ScriptedRemote;
use async_trait::async_trait;
use derive_more::{Display, Error};
use draftcast_history::{ContentHash, PartitionKey};
use std::sync::Arc;

/// A remote save error with automatic location tracking.
pub type RemoteError = exn::Exn<RemoteErrorKind>;
/// Result type alias for remote save calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
pub type RemoteHandle = Arc<dyn RemoteSave + Send + Sync>;

/// Content the remote reported holding, identified by its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContent {
    pub hash: ContentHash,
    /// Not every service sends the body back; only the hash is guaranteed.
    pub content: Option<String>,
}
impl RemoteContent {
    pub fn of(content: impl Into<String>) -> Self {
        let content = content.into();
        Self { hash: ContentHash::of(&content), content: Some(content) }
    }

    pub fn hash_only(hash: ContentHash) -> Self {
        Self { hash, content: None }
    }
}

/// One snapshot push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub partition: PartitionKey,
    pub content: String,
    /// Hash the caller believes the remote holds. `None` overwrites
    /// unconditionally.
    pub expected: Option<ContentHash>,
}

/// Successful save response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAck {
    /// What the remote held before accepting the write, when it says so.
    pub previous: Option<RemoteContent>,
}

#[derive(Debug, Display, Error)]
pub enum RemoteErrorKind {
    /// The service could not be reached.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The service failed while handling the request.
    #[display("server error: {_0}")]
    Server(#[error(not(source))] String),
    /// The service refused the request for good (validation, permissions).
    #[display("save rejected: {_0}")]
    Rejected(#[error(not(source))] String),
    /// The service refused because it holds content other than `expected`.
    #[display("remote holds different content ({})", _0.hash)]
    Diverged(#[error(not(source))] RemoteContent),
}

impl RemoteErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server(_))
    }
}

/// Remote persistence of the canonical project record.
///
/// Implementations must be safe to call from any tokio task. The coordinator
/// never issues more than one call per editing session at a time.
#[async_trait]
pub trait RemoteSave: Send + Sync {
    async fn save(&self, request: SaveRequest) -> RemoteResult<RemoteAck>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RemoteErrorKind::Network("offline".into()), true)]
    #[case(RemoteErrorKind::Server("502".into()), true)]
    #[case(RemoteErrorKind::Rejected("too long".into()), false)]
    #[case(RemoteErrorKind::Diverged(RemoteContent::of("theirs")), false)]
    fn test_retryable(#[case] kind: RemoteErrorKind, #[case] retryable: bool) {
        assert_eq!(kind.is_retryable(), retryable);
    }

    #[test]
    fn test_remote_content_hash() {
        let remote = RemoteContent::of("episode one");
        assert_eq!(remote.hash, ContentHash::of("episode one"));
        assert_eq!(remote.content.as_deref(), Some("episode one"));
        assert!(RemoteContent::hash_only(remote.hash.clone()).content.is_none());
    }
}
