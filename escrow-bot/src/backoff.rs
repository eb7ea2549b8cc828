//! Exponential backoff: initial delay, factor 2, capped at a maximum. Attempts are unbounded.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            next: self.initial,
            attempts: 0,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(60))
    }
}

/// Delay sequence for one run of consecutive failures. Start a new one after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.policy.max);
        self.next = self.next.saturating_mul(2).min(self.policy.max);
        self.attempts += 1;
        delay
    }

    /// Failures seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
