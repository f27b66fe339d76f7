//! Save-state coordination for one editing session.

mod save;
mod state;

pub use self::state::Conflict;
use self::state::{SaveMode, SaveState};
use crate::error::{ErrorKind, Result};
use crate::remote::RemoteHandle;
use crate::settings::AutosaveSettings;
use crate::status::{Action, SaveStatus};
use draftcast_history::{ContentHash, PartitionKey, RevisionEntry, RevisionStore};
use exn::OptionExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::UtcDateTime;
use tokio::sync::watch;
use tracing::instrument;

/// The remote record as loaded when the session opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// `None` when the record has never been saved.
    pub content: Option<String>,
    /// When the remote was last read or written successfully.
    pub seen_at: Option<UtcDateTime>,
}

/// Everything the display layer renders, taken at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub status: SaveStatus,
    pub buffer: String,
    pub pending: Option<String>,
    /// Locally recovered revision offered for application.
    pub draft: Option<RevisionEntry>,
    pub conflict: Option<Conflict>,
    pub last_error: Option<String>,
    pub last_saved_hash: Option<ContentHash>,
    pub last_remote_seen_at: Option<UtcDateTime>,
}

#[derive(Default)]
pub struct SaveCoordinatorBuilder {
    partition: Option<PartitionKey>,
    store: Option<Arc<RevisionStore>>,
    remote: Option<RemoteHandle>,
    settings: AutosaveSettings,
    snapshot: RemoteSnapshot,
}

impl SaveCoordinatorBuilder {
    pub fn partition(mut self, partition: PartitionKey) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn store(mut self, store: Arc<RevisionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn remote(mut self, remote: RemoteHandle) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn settings(mut self, settings: AutosaveSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn snapshot(mut self, snapshot: RemoteSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Open the session.
    ///
    /// Consults the revision history for a local revision newer than the
    /// remote snapshot; if one exists and differs from the remote content the
    /// session starts in [`SaveStatus::Draft`] offering it.
    #[instrument(skip_all)]
    pub async fn build(self) -> Result<SaveCoordinator> {
        let partition = self.partition.ok_or_raise(|| ErrorKind::Configuration("no partition key"))?;
        let store = self.store.ok_or_raise(|| ErrorKind::Configuration("no revision store"))?;
        let remote = self.remote.ok_or_raise(|| ErrorKind::Configuration("no remote save service"))?;
        self.settings.validate()?;

        let RemoteSnapshot { content, seen_at } = self.snapshot;
        let remote_hash = content.as_deref().map(ContentHash::of);
        let draft = store.latest(&partition).await.filter(|latest| {
            seen_at.is_none_or(|seen_at| latest.created_at > seen_at) && Some(&latest.content_hash) != remote_hash.as_ref()
        });
        if let Some(draft) = &draft {
            tracing::info!(%partition, revision = %draft.id, "offering recovered draft");
        }

        let state = SaveState::new(content, seen_at, draft);
        let inner = Inner {
            status: watch::Sender::new(state.status),
            state: Mutex::new(state),
            partition,
            store,
            remote,
            settings: self.settings,
        };
        Ok(SaveCoordinator { inner: Arc::new(inner) })
    }
}

pub(crate) struct Inner {
    partition: PartitionKey,
    store: Arc<RevisionStore>,
    remote: RemoteHandle,
    settings: AutosaveSettings,
    state: Mutex<SaveState>,
    status: watch::Sender<SaveStatus>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, state: &mut SaveState, status: SaveStatus) {
        if state.status != status {
            tracing::debug!(partition = %self.partition, from = %state.status, to = %status, "save status changed");
        }
        state.status = status;
        self.status.send_if_modified(|current| std::mem::replace(current, status) != status);
    }
}

/// Handle to one editing session.
///
/// Cheap to clone; every clone drives the same session. Must be used from
/// within a tokio runtime, since edits and saves schedule tasks.
///
/// # Examples
///
/// ```no_run
/// # use draftcast_autosave::{RemoteHandle, RemoteSnapshot, SaveCoordinator, error::Result};
/// # use draftcast_history::{PartitionKey, RevisionStore};
/// # use std::sync::Arc;
/// # async fn example(store: Arc<RevisionStore>, remote: RemoteHandle) -> Result<()> {
/// let session = SaveCoordinator::builder()
///     .partition(PartitionKey::new("my-podcast", Some(3)))
///     .store(store)
///     .remote(remote)
///     .snapshot(RemoteSnapshot { content: Some("Intro".into()), seen_at: None })
///     .build()
///     .await?;
///
/// let mut status = session.subscribe();
/// session.edit("Intro, take two")?;
/// while status.changed().await.is_ok() {
///     println!("{}", *status.borrow());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<Inner>,
}

impl SaveCoordinator {
    pub fn builder() -> SaveCoordinatorBuilder {
        SaveCoordinatorBuilder::default()
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.inner.partition
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn view(&self) -> SessionView {
        let state = self.inner.lock();
        SessionView {
            status: state.status,
            buffer: state.buffer.clone(),
            pending: state.pending.clone(),
            draft: state.draft.clone(),
            conflict: state.conflict.clone(),
            last_error: state.last_error.clone(),
            last_saved_hash: state.last_saved.clone(),
            last_remote_seen_at: state.remote_seen_at,
        }
    }

    /// Replace the editor content.
    ///
    /// Always accepted while the session is open. Drops any offered draft or
    /// unresolved conflict and (re)starts the quiescence timer.
    pub fn edit(&self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let mut state = self.open_state()?;
        if state.draft.take().is_some() {
            tracing::debug!(partition = %self.inner.partition, "recovered draft dropped by edit");
        }
        state.conflict = None;
        state.retry = None;
        state.failures = 0;
        state.buffer.clone_from(&content);
        state.pending = Some(content);
        self.inner.set_status(&mut state, SaveStatus::Dirty);
        self.inner.schedule_debounce(&mut state);
        Ok(())
    }

    /// Save now instead of waiting.
    ///
    /// From [`SaveStatus::Dirty`] this skips the quiescence interval. From
    /// [`SaveStatus::Error`] it retries immediately with a fresh attempt
    /// budget. From [`SaveStatus::Conflict`] it overwrites the remote with the
    /// local content.
    pub fn force_save(&self) -> Result<()> {
        let mut state = self.open_state()?;
        let mode = match state.status {
            SaveStatus::Dirty => SaveMode::Checked,
            SaveStatus::Error => {
                state.failures = 0;
                state.attempt_mode
            },
            SaveStatus::Conflict => {
                state.conflict = None;
                if state.pending.is_none() {
                    state.pending = Some(state.buffer.clone());
                }
                tracing::info!(partition = %self.inner.partition, "overwriting diverged remote content");
                SaveMode::Force
            },
            status => exn::bail!(ErrorKind::InvalidAction { action: Action::ForceSave, status }),
        };
        self.inner.dispatch(&mut state, mode);
        Ok(())
    }

    /// Give up local content in favour of the remote's.
    ///
    /// Declines an offered draft, or resolves a conflict by restoring the
    /// remote content into the buffer. If the remote already accepted our
    /// write, the restored content has to be saved back and the session goes
    /// [`SaveStatus::Dirty`]. A conflict whose remote refused our write
    /// without reporting its content cannot be discarded; overwrite it or
    /// keep editing.
    pub fn discard(&self) -> Result<()> {
        let mut state = self.open_state()?;
        match state.status {
            SaveStatus::Draft => {
                state.draft = None;
                state.buffer = state.remote_content.clone().unwrap_or_default();
                state.pending = None;
                self.inner.set_status(&mut state, SaveStatus::Idle);
            },
            SaveStatus::Conflict => {
                // A refused write that reported only a hash leaves nothing to restore.
                let Some(conflict) = state.conflict.take_if(|conflict| conflict.accepted || conflict.remote.content.is_some())
                else {
                    exn::bail!(ErrorKind::InvalidAction { action: Action::Discard, status: state.status });
                };
                match (conflict.accepted, conflict.remote.content) {
                    (true, Some(theirs)) => {
                        state.buffer.clone_from(&theirs);
                        state.pending = Some(theirs);
                        self.inner.set_status(&mut state, SaveStatus::Dirty);
                        self.inner.schedule_debounce(&mut state);
                    },
                    (true, None) => {
                        tracing::warn!(
                            partition = %self.inner.partition,
                            "remote did not report the content it replaced; keeping local content"
                        );
                        state.pending = None;
                        self.inner.set_status(&mut state, SaveStatus::Idle);
                    },
                    (false, theirs) => {
                        if let Some(theirs) = theirs {
                            state.buffer.clone_from(&theirs);
                            state.remote_content = Some(theirs);
                        }
                        state.last_saved = Some(conflict.remote.hash);
                        state.remote_seen_at = Some(UtcDateTime::now());
                        state.pending = None;
                        self.inner.set_status(&mut state, SaveStatus::Idle);
                    },
                }
            },
            status => exn::bail!(ErrorKind::InvalidAction { action: Action::Discard, status }),
        }
        Ok(())
    }

    /// Take the offered draft as the editor content and schedule it for
    /// saving.
    pub fn apply_draft(&self) -> Result<()> {
        let mut state = self.open_state()?;
        let status = state.status;
        let Some(draft) = state.draft.take_if(|_| status == SaveStatus::Draft) else {
            exn::bail!(ErrorKind::InvalidAction { action: Action::ApplyDraft, status });
        };
        tracing::info!(partition = %self.inner.partition, revision = %draft.id, "applying recovered draft");
        state.buffer.clone_from(&draft.content);
        state.pending = Some(draft.content);
        self.inner.set_status(&mut state, SaveStatus::Dirty);
        self.inner.schedule_debounce(&mut state);
        Ok(())
    }

    /// End the session. Timers are cancelled; a save already in flight runs
    /// to completion and is still recorded in the revision history, but its
    /// result no longer changes the session.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if !state.closed {
            tracing::debug!(partition = %self.inner.partition, status = %state.status, "closing editing session");
        }
        state.closed = true;
        state.cancel_timers();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn open_state(&self) -> Result<MutexGuard<'_, SaveState>> {
        let state = self.inner.lock();
        if state.closed {
            exn::bail!(ErrorKind::Closed);
        }
        Ok(state)
    }
}
