//! Cancelable delayed work.

use std::time::Duration;
use tokio::task::JoinHandle;

/// A closure that runs once after a delay unless cancelled first.
///
/// Dropping the handle cancels the task, so replacing a stored `DelayedTask`
/// with a new one is all it takes to reschedule. The closure runs on the
/// runtime's own task and should only hand work off (it must not block).
///
/// Built on [`tokio::time::sleep`], so it follows paused test time.
#[derive(Debug)]
#[must_use = "the task is cancelled as soon as the handle is dropped"]
pub struct DelayedTask {
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Schedule `task` to run after `delay`. Must be called within a tokio
    /// runtime.
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Self { handle }
    }

    /// Whether the closure has run (or the task was cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        // Dropping aborts.
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
