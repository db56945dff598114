//! Delay schedule between generation attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay evolves across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles before each retry, capped at a maximum.
    Exponential,
}

/// Backoff state for one retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff that waits `delay` before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            policy: BackoffPolicy::Fixed,
            initial: delay,
            max: delay,
            current: delay,
        }
    }

    /// Creates a backoff starting at `initial`, doubling up to `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            policy: BackoffPolicy::Exponential,
            initial,
            max,
            current: initial,
        }
    }

    /// Creates a backoff for the given policy.
    ///
    /// Exponential schedules cap at eight times the base delay.
    pub fn from_policy(policy: BackoffPolicy, delay: Duration) -> Self {
        match policy {
            BackoffPolicy::Fixed => Self::fixed(delay),
            BackoffPolicy::Exponential => Self::exponential(delay, delay * 8),
        }
    }

    /// Returns the current delay.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Advances to the next delay.
    pub fn next(&mut self) {
        if self.policy == BackoffPolicy::Exponential {
            self.current = (self.current * 2).min(self.max);
        }
    }

    /// Resets to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Sleeps for the current delay, then advances.
    pub async fn wait(&mut self) {
        if !self.current.is_zero() {
            tokio::time::sleep(self.current).await;
        }
        self.next();
    }
}
