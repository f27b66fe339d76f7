//! Script revision history.
//!
//! This crate keeps a durable, deduplicated history of script snapshots on
//! the user's device. The history is an optimization for recovery, not the
//! source of truth: the remote project record is. If the stored history is
//! lost or corrupt, the store quietly starts over from empty.
//!
//! # Architecture
//! - **Entries** are immutable snapshots keyed by [`PartitionKey`] (project
//!   plus episode) and deduplicated by [`ContentHash`] (BLAKE3 of the
//!   content) within a partition.
//! - The **store** keeps at most a fixed number of entries across all
//!   partitions, evicting the oldest first, and persists them as a single
//!   versioned JSON document through a [`StorageBackend`](draftcast_storage::StorageBackend).
//! - **Migration** converts the legacy (unversioned) document into the
//!   current schema on open.

pub mod error;
mod migrate;
mod models;
mod store;
mod summary;

pub use crate::migrate::Migration;
pub use crate::models::{ContentHash, EpisodeKey, PartitionKey, RevisionEntry, RevisionId};
pub use crate::store::{CURRENT_KEY, HistoryOptions, LEGACY_KEY, RevisionStore};
pub use crate::summary::summarize;
