//! Attempt counts and backoff schedules per fetch tier.

use std::time::Duration;

/// Fixed attempt budget with linear backoff.
///
/// Backoff is `base_delay * attempt_index`, no jitter; linear rather than
/// exponential so total wall-clock time stays predictable under the caller's
/// overall deadline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Budget for the browser-rendering tier.
    pub const fn render_tier() -> Self {
        Self::new(2, Duration::from_millis(500))
    }

    /// Budget for the raw HTTP tier.
    pub const fn http_tier() -> Self {
        Self::new(3, Duration::from_millis(500))
    }

    /// Budget for one fallback-chain state.
    pub const fn fallback_stage() -> Self {
        Self::new(2, Duration::from_millis(300))
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another try is allowed after the given 1-based attempt index.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to sleep after the given 1-based attempt index.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}
