use super::{ContentHash, PartitionKey, RevisionEntry, RevisionId};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// Schema version written by this build.
pub(crate) const SCHEMA_VERSION: u32 = 2;

/// The complete persisted history, as stored under the current key.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Document {
    pub(crate) version: u32,
    pub(crate) entries: Vec<RevisionRecord>,
}
impl Document {
    pub(crate) fn encode(entries: &[RevisionEntry]) -> Result<Vec<u8>, Error> {
        let document = Self {
            version: SCHEMA_VERSION,
            entries: entries.iter().map(RevisionRecord::try_from).collect::<Result<Vec<_>, _>>()?,
        };
        serde_json::to_vec(&document).or_raise(|| ErrorKind::InvalidData("document"))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<RevisionEntry>, Error> {
        let document: Self = serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidData("document"))?;
        if document.version != SCHEMA_VERSION {
            exn::bail!(ErrorKind::UnsupportedSchema(document.version));
        }
        document.entries.into_iter().map(RevisionEntry::try_from).collect()
    }
}

/// On-disk form of a [`RevisionEntry`].
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RevisionRecord {
    pub(crate) id: RevisionId,
    pub(crate) project_id: String,
    pub(crate) episode: super::EpisodeKey,
    /// Unix timestamp in nanoseconds.
    pub(crate) created_at: i64,
    pub(crate) content: String,
    pub(crate) summary: String,
    pub(crate) length: u64,
    pub(crate) content_hash: ContentHash,
}
impl TryFrom<&RevisionEntry> for RevisionRecord {
    type Error = Error;
    fn try_from(entry: &RevisionEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entry.id,
            project_id: entry.partition.project_id.clone(),
            episode: entry.partition.episode,
            created_at: i64::try_from(entry.created_at.unix_timestamp_nanos())
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            content: entry.content.clone(),
            summary: entry.summary.clone(),
            length: u64::try_from(entry.length).or_raise(|| ErrorKind::InvalidData("length"))?,
            content_hash: entry.content_hash.clone(),
        })
    }
}
impl TryFrom<RevisionRecord> for RevisionEntry {
    type Error = Error;
    /// The stored hash is only a cache: dedup keys off the content itself.
    fn try_from(record: RevisionRecord) -> Result<Self, Self::Error> {
        let content_hash = ContentHash::of(&record.content);
        if content_hash != record.content_hash {
            tracing::warn!(revision = %record.id, stored = %record.content_hash, "stored content hash is stale; recomputed");
        }
        Ok(Self {
            id: record.id,
            partition: PartitionKey { project_id: record.project_id, episode: record.episode },
            created_at: UtcDateTime::from_unix_timestamp_nanos(i128::from(record.created_at))
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            content: record.content,
            summary: record.summary,
            length: usize::try_from(record.length).or_raise(|| ErrorKind::InvalidData("length"))?,
            content_hash,
        })
    }
}
