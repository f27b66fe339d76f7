//! The save path: timers, dispatching remote writes and evaluating results.

use super::Inner;
use super::state::{Conflict, SaveMode, SaveState, Timer};
use crate::remote::{RemoteAck, RemoteErrorKind, RemoteResult, SaveRequest};
use crate::schedule::DelayedTask;
use crate::settings::DivergenceCheck;
use crate::status::SaveStatus;
use draftcast_history::ContentHash;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// What a finished remote call means for the session.
enum Outcome {
    Saved,
    Conflict(Conflict),
    Failed { retryable: bool, message: String },
}

#[derive(Clone, Copy)]
enum TimerKind {
    Debounce,
    Retry,
}

impl Inner {
    pub(super) fn schedule_debounce(self: &Arc<Self>, state: &mut SaveState) {
        let delay = self.settings.debounce;
        tracing::debug!(partition = %self.partition, ?delay, "scheduling autosave");
        state.debounce = Some(self.timer(state, delay, TimerKind::Debounce));
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut SaveState) {
        let delay = self.settings.backoff(state.failures);
        tracing::debug!(partition = %self.partition, ?delay, attempt = state.failures + 1, "scheduling save retry");
        state.retry = Some(self.timer(state, delay, TimerKind::Retry));
    }

    fn timer(self: &Arc<Self>, state: &mut SaveState, delay: Duration, kind: TimerKind) -> Timer {
        let id = state.timer_id();
        let inner = Arc::downgrade(self);
        let task = DelayedTask::spawn(delay, move || {
            if let Some(inner) = inner.upgrade() {
                inner.fire(kind, id);
            }
        });
        Timer { id, _task: task }
    }

    fn fire(self: &Arc<Self>, kind: TimerKind, id: u64) {
        let mut state = self.lock();
        let slot = match kind {
            TimerKind::Debounce => &mut state.debounce,
            TimerKind::Retry => &mut state.retry,
        };
        // Superseded while waiting for the lock.
        if slot.as_ref().is_none_or(|timer| timer.id != id) {
            return;
        }
        // Aborting a task that is already past its last await point is a no-op.
        slot.take();
        if state.closed {
            return;
        }
        let mode = match kind {
            TimerKind::Debounce => SaveMode::Checked,
            TimerKind::Retry => state.attempt_mode,
        };
        self.dispatch(&mut state, mode);
    }

    /// Start saving the newest pending content, or queue it behind the save
    /// that is already outstanding.
    pub(super) fn dispatch(self: &Arc<Self>, state: &mut SaveState, mode: SaveMode) {
        state.debounce = None;
        state.retry = None;
        if state.in_flight {
            tracing::debug!(partition = %self.partition, ?mode, "save already in flight; queueing");
            state.requeue = state.requeue.max(Some(mode));
            return;
        }
        let Some(content) = state.pending.clone() else {
            return;
        };
        let issued = ContentHash::of(&content);
        if mode == SaveMode::Checked && state.last_saved.as_ref() == Some(&issued) {
            tracing::debug!(partition = %self.partition, hash = %issued, "content already saved; skipping remote write");
            state.pending = None;
            state.failures = 0;
            state.last_error = None;
            self.set_status(state, SaveStatus::Saved);
            return;
        }

        let base = state.last_saved.clone();
        let expected = match (mode, self.settings.divergence) {
            (SaveMode::Checked, DivergenceCheck::Strict) => base.clone(),
            (SaveMode::Force, _) | (_, DivergenceCheck::Disabled) => None,
        };
        state.in_flight = true;
        state.attempt_mode = mode;
        self.set_status(state, SaveStatus::Saving);

        let request = SaveRequest { partition: self.partition.clone(), content, expected };
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.save(request, issued, base, mode).await });
    }

    #[instrument(skip_all, fields(partition = %self.partition, ?mode, hash = %issued))]
    async fn save(self: Arc<Self>, request: SaveRequest, issued: ContentHash, base: Option<ContentHash>, mode: SaveMode) {
        let content = request.content.clone();
        let result = self.remote.save(request).await;
        let outcome = self.evaluate(result, &issued, base.as_ref(), mode);

        let persisted = match &outcome {
            Outcome::Saved => true,
            Outcome::Conflict(conflict) => conflict.accepted,
            Outcome::Failed { .. } => false,
        };
        if persisted {
            tracing::info!(bytes = content.len(), "saved script");
            // Recorded even when the session has been closed meanwhile.
            if self.store.record(&self.partition, &content).await.is_none() {
                tracing::debug!("saved content already in revision history");
            }
        }
        self.complete(outcome, content, issued);
    }

    fn evaluate(
        &self,
        result: RemoteResult<RemoteAck>,
        issued: &ContentHash,
        base: Option<&ContentHash>,
        mode: SaveMode,
    ) -> Outcome {
        match result {
            Ok(RemoteAck { previous }) => {
                let Some(previous) = previous else {
                    tracing::debug!("remote did not report its prior content; cannot check for divergence");
                    return Outcome::Saved;
                };
                let divergent = mode == SaveMode::Checked
                    && self.settings.divergence.is_divergent(Some(&previous.hash), base, issued);
                if divergent {
                    Outcome::Conflict(Conflict { remote: previous, accepted: true })
                } else {
                    Outcome::Saved
                }
            },
            Err(err) => match &*err {
                RemoteErrorKind::Diverged(remote) => Outcome::Conflict(Conflict { remote: remote.clone(), accepted: false }),
                kind => {
                    if kind.is_retryable() {
                        tracing::warn!(error = ?err, "save failed");
                    } else {
                        tracing::error!(error = ?err, "save rejected");
                    }
                    Outcome::Failed { retryable: kind.is_retryable(), message: kind.to_string() }
                },
            },
        }
    }

    fn complete(self: &Arc<Self>, outcome: Outcome, content: String, issued: ContentHash) {
        let mut state = self.lock();
        state.in_flight = false;
        let requeue = state.requeue.take();
        if state.closed {
            tracing::debug!("session closed while saving; result discarded");
            return;
        }

        match outcome {
            Outcome::Saved => {
                state.mark_saved(content, issued);
                state.failures = 0;
                state.last_error = None;
                if state.pending.is_some() {
                    // Newer content arrived while this save was outstanding.
                    self.dispatch(&mut state, requeue.unwrap_or(SaveMode::Checked));
                } else {
                    self.set_status(&mut state, SaveStatus::Saved);
                }
            },
            Outcome::Conflict(conflict) => {
                tracing::warn!(remote = %conflict.remote.hash, accepted = conflict.accepted, "remote content diverged");
                if conflict.accepted {
                    state.mark_saved(content, issued);
                }
                state.cancel_timers();
                state.conflict = Some(conflict);
                self.set_status(&mut state, SaveStatus::Conflict);
            },
            Outcome::Failed { retryable, message } => {
                if state.pending.as_deref().is_some_and(|pending| ContentHash::of(pending) != issued) {
                    // Newer content is pending; its own save owns the status and attempt budget.
                    tracing::debug!(error = %message, "save of superseded content failed");
                    if let Some(mode) = requeue {
                        self.dispatch(&mut state, mode);
                    }
                    return;
                }
                state.failures += 1;
                state.last_error = Some(message);
                self.set_status(&mut state, SaveStatus::Error);
                if state.debounce.is_some() {
                    // A newer edit already has its own save scheduled.
                    return;
                }
                if retryable && state.failures < self.settings.max_attempts {
                    self.schedule_retry(&mut state);
                } else if retryable {
                    tracing::warn!(attempts = state.failures, "giving up on automatic save retries");
                }
            },
        }
    }
}
