use super::{EpisodeKey, PartitionKey, RevisionEntry, RevisionId};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::Deserialize;
use time::UtcDateTime;

/// One entry of the legacy (unversioned) history document: a bare JSON array
/// of these, with no hash, summary, or length stored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyRecord {
    pub(crate) id: String,
    pub(crate) project_id: String,
    #[serde(default)]
    pub(crate) episode_number: Option<u32>,
    /// Unix timestamp in milliseconds.
    pub(crate) timestamp: i64,
    pub(crate) content: String,
}
impl LegacyRecord {
    pub(crate) fn decode_all(bytes: &[u8]) -> Result<Vec<Self>, Error> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidData("legacy document"))
    }

    pub(crate) fn into_entry(self, summary_chars: usize) -> Result<RevisionEntry, Error> {
        let created_at = UtcDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp) * 1_000_000)
            .or_raise(|| ErrorKind::InvalidData("legacy timestamp"))?;
        Ok(RevisionEntry::capture(
            RevisionId::from_legacy(&self.id),
            PartitionKey::new(self.project_id, EpisodeKey::from(self.episode_number)),
            self.content,
            created_at,
            summary_chars,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_legacy_array() {
        let json = br#"[
            {"id": "rev-1", "projectId": "pod-1", "episodeNumber": 2, "timestamp": 1700000000000, "content": "A"},
            {"id": "rev-2", "projectId": "pod-1", "episodeNumber": null, "timestamp": 1700000001000, "content": "B"},
            {"id": "rev-3", "projectId": "pod-2", "timestamp": 1700000002000, "content": "C"}
        ]"#;
        let records = LegacyRecord::decode_all(json).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].episode_number, Some(2));
        assert_eq!(records[2].episode_number, None);
    }

    #[test]
    fn test_into_entry() {
        let record = LegacyRecord {
            id: "rev-1".to_string(),
            project_id: "pod-1".to_string(),
            episode_number: Some(2),
            timestamp: 1_700_000_000_123,
            content: "HOST: Hi.".to_string(),
        };
        let entry = record.into_entry(140).unwrap();
        assert_eq!(entry.partition, PartitionKey::new("pod-1", EpisodeKey::Episode(2)));
        assert_eq!(entry.created_at.unix_timestamp_nanos(), 1_700_000_000_123_000_000);
        assert_eq!(entry.id, RevisionId::from_legacy("rev-1"));
        assert_eq!(entry.length, 9);
    }

    #[test]
    fn test_current_document_is_not_legacy() {
        assert!(LegacyRecord::decode_all(br#"{"version": 2, "entries": []}"#).is_err());
    }
}
