use crate::error::{Error, ErrorKind};
use crate::summary::summarize;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::UtcDateTime;
use uuid::Uuid;

/// Which episode of a project a script belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeKey {
    /// The project only ever has one episode.
    #[display("single")]
    Single,
    #[display("episode {_0}")]
    Episode(u32),
}
impl From<Option<u32>> for EpisodeKey {
    fn from(number: Option<u32>) -> Self {
        number.map_or(Self::Single, Self::Episode)
    }
}

/// Identifies one independent revision history (and one save session).
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display("{project_id} ({episode})")]
pub struct PartitionKey {
    pub project_id: String,
    pub episode: EpisodeKey,
}
impl PartitionKey {
    pub fn new(project_id: impl Into<String>, episode: impl Into<EpisodeKey>) -> Self {
        Self { project_id: project_id.into(), episode: episode.into() }
    }
}

/// BLAKE3 digest of script content, rendered as lowercase hex.
///
/// The only thing used to decide whether two snapshots are the same, both for
/// history deduplication and for remote divergence checks.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);
impl ContentHash {
    pub fn of(content: impl AsRef<str>) -> Self {
        Self(blake3::hash(content.as_ref().as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque, never-reused revision identifier.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(Uuid);
impl RevisionId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identifier for an entry imported from a schema that didn't use UUIDs.
    ///
    /// Derived from the legacy identifier so that converting the same legacy
    /// data twice yields the same identifiers.
    pub(crate) fn from_legacy(legacy: &str) -> Self {
        if let Ok(uuid) = Uuid::parse_str(legacy) {
            return Self(uuid);
        }
        let hash = blake3::hash(legacy.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}
impl FromStr for RevisionId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|_| Error::from(ErrorKind::InvalidId(s.to_string())))
    }
}

/// An immutable snapshot of a script at the time it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionEntry {
    pub id: RevisionId,
    pub partition: PartitionKey,
    /// Strictly increasing within one store; used for ordering.
    pub created_at: UtcDateTime,
    pub content: String,
    /// Whitespace-collapsed preview of the content for cheap listing.
    pub summary: String,
    /// Length of the content in characters (not bytes).
    pub length: usize,
    pub content_hash: ContentHash,
}
impl RevisionEntry {
    pub(crate) fn capture(
        id: RevisionId,
        partition: PartitionKey,
        content: impl Into<String>,
        created_at: UtcDateTime,
        summary_chars: usize,
    ) -> Self {
        let content = content.into();
        Self {
            id,
            partition,
            created_at,
            summary: summarize(&content, summary_chars),
            length: content.chars().count(),
            content_hash: ContentHash::of(&content),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_content_hash_is_deterministic() {
        assert_eq!(ContentHash::of("Hello"), ContentHash::of("Hello"));
        assert_ne!(ContentHash::of("Hello"), ContentHash::of("Hello "));
        assert_eq!(ContentHash::of("").as_str(), blake3::hash(b"").to_string());
    }

    #[rstest]
    #[case(None, EpisodeKey::Single)]
    #[case(Some(0), EpisodeKey::Episode(0))]
    #[case(Some(12), EpisodeKey::Episode(12))]
    fn test_episode_key_from_number(#[case] number: Option<u32>, #[case] expected: EpisodeKey) {
        assert_eq!(EpisodeKey::from(number), expected);
    }

    #[test]
    fn test_partition_display() {
        assert_eq!(PartitionKey::new("pod-1", EpisodeKey::Single).to_string(), "pod-1 (single)");
        assert_eq!(PartitionKey::new("pod-1", Some(3)).to_string(), "pod-1 (episode 3)");
    }

    #[test]
    fn test_legacy_ids_are_stable() {
        assert_eq!(RevisionId::from_legacy("rev-1700000000000"), RevisionId::from_legacy("rev-1700000000000"));
        assert_ne!(RevisionId::from_legacy("rev-1"), RevisionId::from_legacy("rev-2"));
        let uuid = "7d4a6c2e-1f7b-4c7e-9a43-2b8e0f5d9c11";
        assert_eq!(RevisionId::from_legacy(uuid).to_string(), uuid);
    }

    #[test]
    fn test_revision_id_parse() {
        let id = RevisionId::random();
        assert_eq!(id.to_string().parse::<RevisionId>().unwrap(), id);
        let err = "not-a-uuid".parse::<RevisionId>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidId(_)));
    }

    #[test]
    fn test_capture_derives_fields() {
        let entry = RevisionEntry::capture(
            RevisionId::random(),
            PartitionKey::new("pod", EpisodeKey::Single),
            "Ünïcödé  intro\n\nline two",
            UtcDateTime::now(),
            10,
        );
        assert_eq!(entry.length, 24);
        assert_eq!(entry.summary, "Ünïcödé in");
        assert_eq!(entry.content_hash, ContentHash::of("Ünïcödé  intro\n\nline two"));
    }
}
