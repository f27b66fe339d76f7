//! Schema migration from the legacy history document.
//!
//! The legacy document is a bare JSON array under [`LEGACY_KEY`] without
//! hashes, summaries, or lengths, and possibly with duplicates. Migration
//! converts it once into the current document under [`CURRENT_KEY`]. The
//! legacy value is left where it is.

use crate::models::{LegacyRecord, RevisionEntry};
use crate::store::{Cache, CURRENT_KEY, LEGACY_KEY, RevisionStore};
use derive_more::Display;

/// What a call to [`RevisionStore::migrate`] found and did.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Readable current-schema data exists; it wins and nothing was changed.
    #[display("history already uses the current schema")]
    Current,
    /// Legacy data was converted; holds the number of entries now retained.
    #[display("migrated legacy history ({_0} entries retained)")]
    Migrated(usize),
    /// There is no readable legacy data to convert.
    #[display("no legacy history found")]
    NothingToMigrate,
    /// The device store could not be read. Nothing was changed.
    #[display("history storage unavailable")]
    Failed,
}

pub(crate) async fn run(store: &RevisionStore, cache: &mut Cache) -> Migration {
    let current = match store.read_current().await {
        Ok(current) => current,
        Err(err) => {
            tracing::warn!(error = ?err, "cannot read revision history; migration skipped");
            return Migration::Failed;
        },
    };
    if current.is_some() {
        store.ensure_loaded(cache).await;
        tracing::debug!(key = CURRENT_KEY, "revision history already uses the current schema");
        return Migration::Current;
    }

    let legacy = match store.backend().read_all(LEGACY_KEY).await {
        Ok(Some(legacy)) => legacy,
        Ok(None) => return Migration::NothingToMigrate,
        Err(err) => {
            tracing::warn!(error = ?err, "cannot read legacy revision history; migration skipped");
            return Migration::Failed;
        },
    };
    let records = match LegacyRecord::decode_all(&legacy) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(error = ?err, key = LEGACY_KEY, "unreadable legacy revision history; leaving it in place");
            return Migration::NothingToMigrate;
        },
    };

    let found = records.len();
    let summary_chars = store.options().summary_chars;
    let converted: Vec<RevisionEntry> = records
        .into_iter()
        .filter_map(|record| {
            let legacy_id = record.id.clone();
            match record.into_entry(summary_chars) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = ?err, legacy_id, "skipping unconvertible legacy revision");
                    None
                },
            }
        })
        .collect();

    // The current document is absent or corrupt at this point, so the cache
    // can only hold entries recorded in this process; they are kept.
    cache.loaded = true;
    store.replace_entries(cache, converted);
    if let Err(err) = store.persist(&cache.entries).await {
        tracing::warn!(error = ?err, "failed to persist migrated history; it stays readable in memory");
    }
    tracing::info!(found, retained = cache.entries.len(), "migrated legacy revision history");
    Migration::Migrated(cache.entries.len())
}
