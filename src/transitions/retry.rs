//! # Retry Policy
//!
//! A failed transition is retried with exponential backoff until it has
//! used up its attempts, after which it is abandoned and no longer picked
//! up by the scanner.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attempt bookkeeping carried by every transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    #[serde(default)]
    pub abandoned: bool,
}

impl RetryState {
    /// Record a failed attempt; returns whether the transition is now abandoned.
    pub fn record_failure(
        &mut self,
        at: DateTime<Utc>,
        reason: impl Into<String>,
        policy: &RetryPolicy,
        permanent: bool,
    ) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt = Some(at);
        self.last_failure = Some(reason.into());
        if permanent || self.attempts >= policy.max_attempts {
            self.abandoned = true;
        }
        self.abandoned
    }

    pub fn reset(&mut self) {
        *self = RetryState::default();
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    /// Wait after the `attempts`-th failure: `min(base * 2^(attempts-1), max)`
    pub fn backoff(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(attempts - 1).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    /// Whether a transition with this state may be attempted at `now`
    pub fn is_eligible(&self, state: &RetryState, now: DateTime<Utc>) -> bool {
        if state.abandoned || state.attempts >= self.max_attempts {
            return false;
        }
        match state.last_attempt {
            None => true,
            Some(last) => match chrono::Duration::from_std(self.backoff(state.attempts)) {
                Ok(wait) => last + wait <= now,
                Err(_) => false,
            },
        }
    }
}
