mod entry;
mod legacy;
mod record;

pub use self::entry::{ContentHash, EpisodeKey, PartitionKey, RevisionEntry, RevisionId};
pub(crate) use self::legacy::LegacyRecord;
pub(crate) use self::record::Document;
