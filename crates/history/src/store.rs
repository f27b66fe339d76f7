//! The revision store.
//!
//! One JSON document under [`CURRENT_KEY`] holds every retained entry for
//! every partition. The store keeps that document cached in memory behind an
//! async mutex, and every mutation is a read-modify-write of the whole set
//! performed while holding the lock: there is exactly one writer at a time,
//! which is what keeps the global cap and the dedup check consistent.

use crate::error::{ErrorKind, Result};
use crate::migrate::Migration;
use crate::models::{ContentHash, Document, PartitionKey, RevisionEntry, RevisionId};
use draftcast_storage::BackendHandle;
use exn::ResultExt;
use std::collections::HashSet;
use time::{Duration, UtcDateTime};
use tokio::sync::Mutex;
use tracing::instrument;

/// Storage key of the current-schema history document.
pub const CURRENT_KEY: &str = "script-revisions.v2";
/// Storage key of the legacy (unversioned) history document.
pub const LEGACY_KEY: &str = "script-revisions";

/// Tunables for a [`RevisionStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Maximum number of entries retained across all partitions.
    pub capacity: usize,
    /// Maximum length (in characters) of an entry's summary.
    pub summary_chars: usize,
}
impl Default for HistoryOptions {
    fn default() -> Self {
        Self { capacity: 200, summary_chars: 140 }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Cache {
    /// Ordered by `created_at`, oldest first.
    pub(crate) entries: Vec<RevisionEntry>,
    /// Whether the durable document has been read (or found to be absent or
    /// corrupt). Until then, writing would clobber data we haven't seen.
    pub(crate) loaded: bool,
}

/// Durable, deduplicated, capacity-bounded history of script snapshots.
///
/// Every failure of the underlying storage is absorbed: an unreadable
/// document behaves like an empty history, a failed write leaves the entry in
/// memory only. Nothing here ever blocks editing or saving.
///
/// # Examples
///
/// ```
/// use draftcast_history::{HistoryOptions, PartitionKey, RevisionStore};
/// use draftcast_storage::backend::LocalBackend;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = std::env::temp_dir().join("draftcast-doctest-store");
/// let backend = Arc::new(LocalBackend::new("device", &dir)?);
/// let store = RevisionStore::open(backend, HistoryOptions::default()).await;
/// let partition = PartitionKey::new("my-podcast", Some(1));
/// store.record(&partition, "INTRO: Welcome back.").await;
/// assert!(!store.list(&partition).await.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct RevisionStore {
    backend: BackendHandle,
    options: HistoryOptions,
    pub(crate) cache: Mutex<Cache>,
}

impl RevisionStore {
    /// Create a store over `backend` and run the schema migration once.
    pub async fn open(backend: BackendHandle, options: HistoryOptions) -> Self {
        Self::open_with_migration(backend, options).await.0
    }

    /// Like [`open`](Self::open), also reporting what the migration found.
    #[instrument(skip_all, fields(backend = backend.name()))]
    pub async fn open_with_migration(backend: BackendHandle, options: HistoryOptions) -> (Self, Migration) {
        let store = Self { backend, options, cache: Mutex::new(Cache::default()) };
        let migration = store.migrate().await;
        (store, migration)
    }

    pub fn options(&self) -> HistoryOptions {
        self.options
    }

    pub(crate) fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Record a snapshot of `content` for `partition`.
    ///
    /// Returns `None` without touching anything when the partition already
    /// holds an entry with identical content. Otherwise the new entry is
    /// appended, the oldest entries (of any partition) beyond capacity are
    /// evicted, and the whole set is written back.
    #[instrument(skip(self, partition, content), fields(partition = %partition, length = content.len()))]
    pub async fn record(&self, partition: &PartitionKey, content: &str) -> Option<RevisionEntry> {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;

        let hash = ContentHash::of(content);
        if cache.entries.iter().any(|e| e.partition == *partition && e.content_hash == hash) {
            tracing::debug!(%hash, "identical revision already recorded");
            return None;
        }

        let created_at = next_timestamp(cache.entries.last());
        let entry = RevisionEntry::capture(
            RevisionId::random(),
            partition.clone(),
            content,
            created_at,
            self.options.summary_chars,
        );
        cache.entries.push(entry.clone());
        evict_oldest(&mut cache.entries, self.options.capacity);

        if cache.loaded {
            if let Err(err) = self.persist(&cache.entries).await {
                tracing::warn!(error = ?err, "failed to persist revision history; keeping it in memory");
            }
        } else {
            tracing::debug!("history document not readable yet; revision kept in memory");
        }
        Some(entry)
    }

    /// All entries of `partition`, most recent first.
    pub async fn list(&self, partition: &PartitionKey) -> Vec<RevisionEntry> {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;
        cache.entries.iter().rev().filter(|e| e.partition == *partition).cloned().collect()
    }

    /// Most recent entry of `partition`, if any.
    pub async fn latest(&self, partition: &PartitionKey) -> Option<RevisionEntry> {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;
        cache.entries.iter().rev().find(|e| e.partition == *partition).cloned()
    }

    /// Look up an entry by identifier, regardless of partition.
    pub async fn get(&self, id: RevisionId) -> Option<RevisionEntry> {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;
        cache.entries.iter().find(|e| e.id == id).cloned()
    }

    /// Number of retained entries across all partitions.
    pub async fn len(&self) -> usize {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;
        cache.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Convert legacy history into the current schema. See [`Migration`].
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn migrate(&self) -> Migration {
        let mut cache = self.cache.lock().await;
        crate::migrate::run(self, &mut cache).await
    }

    /// Read the current document into the cache, unless that already happened.
    ///
    /// Corrupt data counts as loaded (and empty) so the next write replaces
    /// it. A storage failure does not: entries recorded meanwhile stay in
    /// memory and get merged with the document once it can be read.
    pub(crate) async fn ensure_loaded(&self, cache: &mut Cache) {
        if cache.loaded {
            return;
        }
        let stored = match self.read_current().await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = ?err, "revision history unavailable; treating it as empty");
                return;
            },
        };
        cache.loaded = true;
        let Some(stored) = stored else {
            return;
        };
        let unsaved = cache.entries.len();
        self.replace_entries(cache, stored);
        if unsaved > 0
            && let Err(err) = self.persist(&cache.entries).await
        {
            tracing::warn!(error = ?err, "failed to persist revision history; keeping it in memory");
        }
    }

    /// Merge `stored` with whatever is already cached, then re-apply the
    /// dedup and capacity rules to the combined set.
    pub(crate) fn replace_entries(&self, cache: &mut Cache, stored: Vec<RevisionEntry>) {
        let mut combined = stored;
        combined.append(&mut cache.entries);
        cache.entries = normalize(combined, self.options.capacity);
    }

    /// Read and decode the current document.
    ///
    /// `Ok(None)` means "nothing usable": absent, or present but corrupt.
    /// `Err` means the storage itself failed.
    pub(crate) async fn read_current(&self) -> Result<Option<Vec<RevisionEntry>>> {
        let Some(bytes) = self.backend.read_all(CURRENT_KEY).await.or_raise(|| ErrorKind::Storage)? else {
            return Ok(None);
        };
        match Document::decode(&bytes) {
            Ok(entries) => Ok(Some(entries)),
            Err(err) => {
                tracing::warn!(error = ?err, key = CURRENT_KEY, "corrupt revision history; treating it as empty");
                Ok(None)
            },
        }
    }

    pub(crate) async fn persist(&self, entries: &[RevisionEntry]) -> Result<()> {
        let bytes = Document::encode(entries)?;
        self.backend.write_all(CURRENT_KEY, &bytes).await.or_raise(|| ErrorKind::Storage)
    }
}

/// Creation time for a new entry: now, unless the clock says otherwise, in
/// which case one nanosecond after the newest entry.
fn next_timestamp(newest: Option<&RevisionEntry>) -> UtcDateTime {
    let now = UtcDateTime::now();
    match newest {
        Some(newest) if newest.created_at >= now => newest.created_at + Duration::nanoseconds(1),
        _ => now,
    }
}

fn evict_oldest(entries: &mut Vec<RevisionEntry>, capacity: usize) {
    if entries.len() > capacity {
        let excess = entries.len() - capacity;
        tracing::debug!(excess, capacity, "evicting oldest revisions");
        entries.drain(..excess);
    }
}

/// Sort by creation time, drop per-partition duplicates (earliest wins),
/// make timestamps strictly increasing, and apply the capacity cap.
pub(crate) fn normalize(mut entries: Vec<RevisionEntry>, capacity: usize) -> Vec<RevisionEntry> {
    entries.sort_by_key(|e| e.created_at);
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert((e.partition.clone(), e.content_hash.clone())));
    let mut previous: Option<UtcDateTime> = None;
    for entry in &mut entries {
        if let Some(previous) = previous
            && entry.created_at <= previous
        {
            entry.created_at = previous + Duration::nanoseconds(1);
        }
        previous = Some(entry.created_at);
    }
    evict_oldest(&mut entries, capacity);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EpisodeKey;
    use draftcast_storage::StorageBackend;
    use draftcast_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;

    fn partition(project: &str, episode: Option<u32>) -> PartitionKey {
        PartitionKey::new(project, episode)
    }

    async fn open_with(backend: Arc<MockBackend>, capacity: usize) -> RevisionStore {
        RevisionStore::open(backend, HistoryOptions { capacity, summary_chars: 140 }).await
    }

    #[tokio::test]
    async fn test_record_then_list() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        let p = partition("pod", Some(1));
        let entry = store.record(&p, "Hello").await.unwrap();
        assert_eq!(entry.content, "Hello");
        assert_eq!(entry.summary, "Hello");
        assert_eq!(entry.length, 5);
        assert_eq!(store.list(&p).await, vec![entry]);
    }

    #[tokio::test]
    async fn test_record_dedups_within_partition() {
        let backend = Arc::new(MockBackend::default());
        let store = open_with(backend.clone(), 200).await;
        let p = partition("pod", Some(1));
        assert!(store.record(&p, "same").await.is_some());
        let writes = backend.write_count();
        assert!(store.record(&p, "same").await.is_none());
        assert_eq!(store.list(&p).await.len(), 1);
        // The duplicate didn't cause a durable write either.
        assert_eq!(backend.write_count(), writes);
    }

    #[tokio::test]
    async fn test_same_content_in_different_partitions() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        assert!(store.record(&partition("pod", Some(1)), "same").await.is_some());
        assert!(store.record(&partition("pod", Some(2)), "same").await.is_some());
        assert!(store.record(&partition("pod", None), "same").await.is_some());
        assert!(store.record(&partition("other", Some(1)), "same").await.is_some());
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_previously_seen_content_is_still_a_duplicate() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        let p = partition("pod", None);
        store.record(&p, "A").await.unwrap();
        store.record(&p, "B").await.unwrap();
        assert!(store.record(&p, "A").await.is_none());
        let contents: Vec<_> = store.list(&p).await.into_iter().map(|e| e.content).collect();
        assert_eq!(contents, ["B", "A"]);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_globally() {
        let store = open_with(Arc::new(MockBackend::default()), 5).await;
        let mut recorded = Vec::new();
        for i in 0..12 {
            let p = partition(if i % 2 == 0 { "even" } else { "odd" }, Some(i % 3));
            recorded.push(store.record(&p, &format!("take {i}")).await.unwrap());
        }
        assert_eq!(store.len().await, 5);
        for old in &recorded[..7] {
            assert!(store.get(old.id).await.is_none(), "{} should be evicted", old.content);
        }
        for new in &recorded[7..] {
            assert_eq!(store.get(new.id).await.as_ref(), Some(new));
        }
    }

    #[tokio::test]
    async fn test_default_capacity_is_two_hundred() {
        let store = open_with(Arc::new(MockBackend::default()), HistoryOptions::default().capacity).await;
        let p = partition("pod", Some(1));
        for i in 0..210 {
            store.record(&p, &format!("revision {i}")).await.unwrap();
        }
        let listed = store.list(&p).await;
        assert_eq!(listed.len(), 200);
        assert_eq!(listed.first().unwrap().content, "revision 209");
        assert_eq!(listed.last().unwrap().content, "revision 10");
    }

    #[rstest]
    #[case(&["a", "b", "c"])]
    #[case(&["c", "b", "a"])]
    #[case(&["x", "a", "x2", "b", "a2"])]
    #[tokio::test]
    async fn test_list_is_most_recent_first(#[case] contents: &[&str]) {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        let p = partition("pod", Some(7));
        let noise = partition("pod", Some(8));
        for content in contents {
            store.record(&p, content).await.unwrap();
            store.record(&noise, content).await.unwrap();
        }
        let listed = store.list(&p).await;
        let listed_contents: Vec<_> = listed.iter().map(|e| e.content.as_str()).collect();
        let expected: Vec<_> = contents.iter().rev().copied().collect();
        assert_eq!(listed_contents, expected);
        assert!(listed.windows(2).all(|pair| pair[0].created_at > pair[1].created_at));
    }

    #[tokio::test]
    async fn test_list_unknown_partition_is_empty() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        store.record(&partition("pod", Some(1)), "x").await.unwrap();
        assert!(store.list(&partition("pod", Some(2))).await.is_empty());
        assert!(store.latest(&partition("pod", Some(2))).await.is_none());
    }

    #[tokio::test]
    async fn test_get_across_partitions() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        let a = store.record(&partition("one", Some(1)), "first").await.unwrap();
        let b = store.record(&partition("two", None), "second").await.unwrap();
        assert_eq!(store.get(a.id).await, Some(a));
        assert_eq!(store.get(b.id).await, Some(b));
        assert_eq!(store.get(RevisionId::random()).await, None);
    }

    #[tokio::test]
    async fn test_latest_is_most_recent() {
        let store = open_with(Arc::new(MockBackend::default()), 200).await;
        let p = partition("pod", None);
        store.record(&p, "draft one").await.unwrap();
        let second = store.record(&p, "draft two").await.unwrap();
        assert_eq!(store.latest(&p).await, Some(second));
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let backend = Arc::new(MockBackend::default());
        let p = partition("pod", Some(1));
        let recorded = {
            let store = open_with(backend.clone(), 200).await;
            store.record(&p, "persist me").await.unwrap()
        };
        let reopened = open_with(backend, 200).await;
        assert_eq!(reopened.list(&p).await, vec![recorded]);
    }

    #[tokio::test]
    async fn test_corrupt_document_degrades_then_recovers() {
        let backend = Arc::new(MockBackend::with_entries([(CURRENT_KEY, b"{not json at all".to_vec())]));
        let store = open_with(backend.clone(), 200).await;
        let p = partition("pod", Some(1));
        assert!(store.list(&p).await.is_empty());

        let entry = store.record(&p, "fresh start").await.unwrap();
        assert_eq!(store.list(&p).await, vec![entry.clone()]);
        // The corrupt document has been replaced with a readable one.
        let bytes = backend.peek(CURRENT_KEY).await.unwrap();
        assert_eq!(Document::decode(&bytes).unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_unsupported_schema_degrades_to_empty() {
        let backend = Arc::new(MockBackend::with_entries([(CURRENT_KEY, br#"{"version":9,"entries":[]}"#.to_vec())]));
        let store = open_with(backend, 200).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_stored_hash_does_not_defeat_dedup() {
        let document = br#"{"version": 2, "entries": [{
            "id": "7d4a6c2e-1f7b-4c7e-9a43-2b8e0f5d9c11",
            "project_id": "pod",
            "episode": {"episode": 1},
            "created_at": 1771177811000000000,
            "content": "Cold open.",
            "summary": "Cold open.",
            "length": 10,
            "content_hash": "edited-by-hand"
        }]}"#;
        let store = open_with(Arc::new(MockBackend::with_entries([(CURRENT_KEY, document.to_vec())])), 200).await;
        let p = partition("pod", Some(1));
        assert_eq!(store.list(&p).await[0].content_hash, ContentHash::of("Cold open."));
        assert!(store.record(&p, "Cold open.").await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_storage_keeps_entries_in_memory() {
        let backend = Arc::new(MockBackend::default());
        let p = partition("pod", Some(1));
        let existing = {
            let store = open_with(backend.clone(), 200).await;
            store.record(&p, "already on disk").await.unwrap()
        };

        backend.fail_reads(true);
        let store = open_with(backend.clone(), 200).await;
        assert!(store.list(&p).await.is_empty());
        let offline = store.record(&p, "typed while offline").await.unwrap();
        // Nothing was written over the document we couldn't read.
        let on_disk = Document::decode(&backend.peek(CURRENT_KEY).await.unwrap()).unwrap();
        assert_eq!(on_disk, vec![existing.clone()]);

        backend.fail_reads(false);
        assert_eq!(store.list(&p).await, vec![offline.clone(), existing.clone()]);
        let on_disk = Document::decode(&backend.peek(CURRENT_KEY).await.unwrap()).unwrap();
        assert_eq!(on_disk, vec![existing, offline]);
    }

    #[tokio::test]
    async fn test_failed_write_is_absorbed() {
        let backend = Arc::new(MockBackend::default());
        let store = open_with(backend.clone(), 200).await;
        backend.fail_writes(true);
        let p = partition("pod", None);
        let entry = store.record(&p, "not durable").await.unwrap();
        assert_eq!(store.list(&p).await, vec![entry]);
        assert!(backend.read_all(CURRENT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_records_respect_cap_and_dedup() {
        let store = Arc::new(open_with(Arc::new(MockBackend::default()), 10).await);
        let mut tasks = Vec::new();
        for i in 0..30u32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let p = PartitionKey::new("pod", EpisodeKey::Episode(i % 4));
                store.record(&p, &format!("content {}", i % 6)).await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(store.len().await <= 10);
        let cache = store.cache.lock().await;
        let unique: HashSet<_> = cache.entries.iter().map(|e| (e.partition.clone(), e.content_hash.clone())).collect();
        assert_eq!(unique.len(), cache.entries.len());
        assert!(cache.entries.windows(2).all(|pair| pair[0].created_at < pair[1].created_at));
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = RevisionEntry::capture(
            RevisionId::random(),
            partition("pod", None),
            "from the future",
            UtcDateTime::now() + Duration::hours(1),
            140,
        );
        let next = next_timestamp(Some(&future));
        assert_eq!(next, future.created_at + Duration::nanoseconds(1));
    }
}
