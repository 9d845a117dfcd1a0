//! Per-step retry policies with exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often a step is attempted and how long to wait between attempts.
///
/// `max_attempts` counts every execution including the first one. The delay
/// after failed attempt `n` is `initial_backoff_ms * base^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each further failure.
    pub base: u32,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            base: 1,
        }
    }

    /// Exponential backoff policy.
    pub const fn exponential(max_attempts: u32, initial_backoff_ms: u64, base: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            base,
        }
    }

    /// Same attempt count without any waiting between attempts.
    pub const fn without_backoff(self) -> Self {
        Self {
            initial_backoff_ms: 0,
            ..self
        }
    }

    /// Effective attempt cap. A policy never runs a step less than once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.base).saturating_pow(exponent);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
