use crate::remote::RemoteContent;
use crate::schedule::DelayedTask;
use crate::status::SaveStatus;
use draftcast_history::{ContentHash, RevisionEntry};
use time::UtcDateTime;

/// Remote divergence that needs the user to pick a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// What the remote held instead of what this session expected.
    pub remote: RemoteContent,
    /// Whether the remote took our write anyway. When it did, the content
    /// above is no longer stored remotely.
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SaveMode {
    /// Compare-and-swap against the last saved hash, skipping redundant
    /// writes.
    Checked,
    /// Overwrite whatever the remote holds.
    Force,
}

/// A scheduled timer and the identifier it fires with. A timer whose
/// identifier no longer matches the slot it was stored in has been
/// superseded and must do nothing.
pub(crate) struct Timer {
    pub id: u64,
    pub _task: DelayedTask,
}

/// Mutable session state. Only ever touched under the coordinator's lock.
pub(crate) struct SaveState {
    pub status: SaveStatus,
    pub buffer: String,
    pub pending: Option<String>,
    pub last_saved: Option<ContentHash>,
    pub remote_content: Option<String>,
    pub remote_seen_at: Option<UtcDateTime>,
    pub draft: Option<RevisionEntry>,
    pub conflict: Option<Conflict>,
    pub in_flight: bool,
    pub requeue: Option<SaveMode>,
    /// Mode of the most recent remote write; retries repeat it.
    pub attempt_mode: SaveMode,
    /// Consecutive failed attempts for the current content.
    pub failures: u32,
    pub last_error: Option<String>,
    pub debounce: Option<Timer>,
    pub retry: Option<Timer>,
    pub next_timer: u64,
    pub closed: bool,
}

impl SaveState {
    pub fn new(remote_content: Option<String>, remote_seen_at: Option<UtcDateTime>, draft: Option<RevisionEntry>) -> Self {
        Self {
            status: if draft.is_some() { SaveStatus::Draft } else { SaveStatus::Idle },
            buffer: remote_content.clone().unwrap_or_default(),
            pending: None,
            last_saved: remote_content.as_deref().map(ContentHash::of),
            remote_content,
            remote_seen_at,
            draft,
            conflict: None,
            in_flight: false,
            requeue: None,
            attempt_mode: SaveMode::Checked,
            failures: 0,
            last_error: None,
            debounce: None,
            retry: None,
            next_timer: 0,
            closed: false,
        }
    }

    pub fn timer_id(&mut self) -> u64 {
        self.next_timer += 1;
        self.next_timer
    }

    pub fn cancel_timers(&mut self) {
        self.debounce = None;
        self.retry = None;
    }

    /// Record that the remote now durably holds `content`.
    pub fn mark_saved(&mut self, content: String, hash: ContentHash) {
        if self.pending.as_deref() == Some(content.as_str()) {
            self.pending = None;
        }
        self.last_saved = Some(hash);
        self.remote_content = Some(content);
        self.remote_seen_at = Some(UtcDateTime::now());
    }
}
