//! Scripted remote save service for testing.

use super::{RemoteAck, RemoteContent, RemoteErrorKind, RemoteResult, RemoteSave, SaveRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// In-memory stand-in for the remote project record.
///
/// Holds a single piece of content and behaves like a compare-and-swap
/// service: a request whose `expected` hash doesn't match what is held fails
/// with [`RemoteErrorKind::Diverged`]. Failures can be queued up front, and
/// every request is kept for later inspection.
///
/// # Examples
///
/// ```
/// use draftcast_autosave::remote::{RemoteErrorKind, RemoteSave, SaveRequest, ScriptedRemote};
/// use draftcast_history::PartitionKey;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let remote = ScriptedRemote::holding("their draft");
/// remote.fail_next(RemoteErrorKind::Network("offline".into()));
///
/// let request = SaveRequest { partition: PartitionKey::new("pod", Some(1)), content: "ours".into(), expected: None };
/// assert!(remote.save(request.clone()).await.is_err());
/// assert!(remote.save(request).await.is_ok());
/// assert_eq!(remote.content().as_deref(), Some("ours"));
/// # }
/// ```
pub struct ScriptedRemote {
    state: Mutex<State>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Default)]
struct State {
    content: Option<String>,
    failures: VecDeque<RemoteErrorKind>,
    requests: Vec<SaveRequest>,
    ignore_expected: bool,
    report: Report,
}

#[derive(Default, Clone, Copy)]
enum Report {
    #[default]
    Content,
    HashOnly,
    Nothing,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedRemote {
    /// Remote already holding `content`.
    pub fn holding(content: impl Into<String>) -> Self {
        let remote = Self::default();
        remote.set_content(content);
        remote
    }

    /// Every call takes `latency` (in tokio time) before it is answered.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept every write regardless of `expected`, like a last-write-wins
    /// service. Prior content is still reported in the acknowledgement.
    pub fn ignoring_expected(self) -> Self {
        self.state().ignore_expected = true;
        self
    }

    /// Acknowledge with the prior hash only.
    pub fn reporting_hash_only(self) -> Self {
        self.state().report = Report::HashOnly;
        self
    }

    /// Acknowledge without saying anything about prior content.
    pub fn without_reports(self) -> Self {
        self.state().report = Report::Nothing;
        self
    }

    /// Simulate someone else saving from another device.
    pub fn set_content(&self, content: impl Into<String>) {
        self.state().content = Some(content.into());
    }

    pub fn content(&self) -> Option<String> {
        self.state().content.clone()
    }

    /// Queue a failure for the next call that isn't already answered.
    pub fn fail_next(&self, kind: RemoteErrorKind) {
        self.state().failures.push_back(kind);
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<SaveRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Highest number of calls that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, request: &SaveRequest) -> RemoteResult<RemoteAck> {
        let mut state = self.state();
        if let Some(kind) = state.failures.pop_front() {
            exn::bail!(kind);
        }
        let previous = state.content.as_deref().map(RemoteContent::of);
        if !state.ignore_expected
            && let (Some(expected), Some(previous)) = (&request.expected, &previous)
            && &previous.hash != expected
        {
            let held = match state.report {
                Report::Content => previous.clone(),
                Report::HashOnly | Report::Nothing => RemoteContent::hash_only(previous.hash.clone()),
            };
            exn::bail!(RemoteErrorKind::Diverged(held));
        }
        state.content = Some(request.content.clone());
        let previous = match state.report {
            Report::Content => previous,
            Report::HashOnly => previous.map(|p| RemoteContent::hash_only(p.hash)),
            Report::Nothing => None,
        };
        Ok(RemoteAck { previous })
    }
}

#[async_trait]
impl RemoteSave for ScriptedRemote {
    async fn save(&self, request: SaveRequest) -> RemoteResult<RemoteAck> {
        self.state().requests.push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answer(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftcast_history::{ContentHash, PartitionKey};

    fn request(content: &str, expected: Option<&str>) -> SaveRequest {
        SaveRequest {
            partition: PartitionKey::new("pod", Some(1)),
            content: content.to_string(),
            expected: expected.map(ContentHash::of),
        }
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let remote = ScriptedRemote::holding("A");
        let ack = remote.save(request("B", Some("A"))).await.unwrap();
        assert_eq!(ack.previous, Some(RemoteContent::of("A")));

        let err = remote.save(request("C", Some("A"))).await.unwrap_err();
        assert!(matches!(&*err, RemoteErrorKind::Diverged(remote) if remote.content.as_deref() == Some("B")));
        assert_eq!(remote.content().as_deref(), Some("B"));

        // Unconditional write.
        remote.save(request("C", None)).await.unwrap();
        assert_eq!(remote.content().as_deref(), Some("C"));
        assert_eq!(remote.request_count(), 3);
    }

    #[tokio::test]
    async fn test_reporting_modes() {
        let remote = ScriptedRemote::holding("A").ignoring_expected().reporting_hash_only();
        let ack = remote.save(request("B", Some("Z"))).await.unwrap();
        assert_eq!(ack.previous, Some(RemoteContent::hash_only(ContentHash::of("A"))));

        let remote = ScriptedRemote::holding("A").reporting_hash_only();
        let err = remote.save(request("B", Some("Z"))).await.unwrap_err();
        assert!(matches!(&*err, RemoteErrorKind::Diverged(held) if *held == RemoteContent::hash_only(ContentHash::of("A"))));

        let remote = ScriptedRemote::holding("A").without_reports();
        assert_eq!(remote.save(request("B", Some("A"))).await.unwrap(), RemoteAck::default());
    }

    #[tokio::test]
    async fn test_queued_failures_leave_content_alone() {
        let remote = ScriptedRemote::holding("A");
        remote.fail_next(RemoteErrorKind::Server("503".into()));
        let err = remote.save(request("B", Some("A"))).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(remote.content().as_deref(), Some("A"));
    }
}
