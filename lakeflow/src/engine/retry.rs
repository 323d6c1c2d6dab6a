//! Retry backoff policy for transient connector failures.
//!
//! The retry *budget* lives on each task unit; this policy only decides
//! how long to wait between attempts.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration: exponential delay with optional full jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap applied to the computed delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to draw the actual delay uniformly from `0..=delay`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Disables jitter, making delays deterministic.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Returns the delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(retry))
            .min(self.max_delay_ms);

        let jittered = if self.jitter && delay > 0 {
            rand::thread_rng().gen_range(0..=delay)
        } else {
            delay
        };

        Duration::from_millis(jittered)
    }
}
