use crate::error::{ErrorKind, Result};
use draftcast_history::ContentHash;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a save response is checked for remote divergence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivergenceCheck {
    /// The remote diverged when it reports a content hash that is neither the
    /// last one this session saved nor the one it just sent.
    #[default]
    Strict,
    /// Never report divergence; every successful save wins.
    Disabled,
}
impl DivergenceCheck {
    /// Whether `remote` (what the remote held) means someone else changed the
    /// record. Without a reported hash there is nothing to compare, so the
    /// save is taken at face value.
    pub fn is_divergent(self, remote: Option<&ContentHash>, last_saved: Option<&ContentHash>, issued: &ContentHash) -> bool {
        match (self, remote) {
            (Self::Disabled, _) | (Self::Strict, None) => false,
            (Self::Strict, Some(remote)) => Some(remote) != last_saved && remote != issued,
        }
    }
}

/// Timing and retry knobs for a [`SaveCoordinator`](crate::SaveCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveSettings {
    /// Quiescence interval between the last edit and the save attempt.
    pub debounce: Duration,
    /// Total attempts (first try included) before a transient failure stops
    /// being retried automatically.
    pub max_attempts: u32,
    /// Delay before the first automatic retry; doubles for each further one.
    pub retry_backoff: Duration,
    /// Upper bound for the retry delay.
    pub retry_backoff_max: Duration,
    pub divergence: DivergenceCheck,
}
impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(30),
            divergence: DivergenceCheck::Strict,
        }
    }
}
impl AutosaveSettings {
    pub fn validate(&self) -> Result<()> {
        if self.debounce.is_zero() {
            exn::bail!(ErrorKind::Configuration("debounce interval must be greater than zero"));
        }
        if self.max_attempts == 0 {
            exn::bail!(ErrorKind::Configuration("at least one save attempt is required"));
        }
        if self.retry_backoff > self.retry_backoff_max {
            exn::bail!(ErrorKind::Configuration("retry backoff exceeds its maximum"));
        }
        Ok(())
    }

    /// Delay before retrying after the `failures`-th consecutive failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor).min(self.retry_backoff_max)
    }
}
