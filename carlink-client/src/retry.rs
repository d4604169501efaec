//! Backoff policy for connecting to the server.

use std::time::Duration;

/// Exponential backoff between connection attempts.
///
/// The delay doubles after each failure, starting at `initial_delay` and
/// capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Total number of attempts, `0` for unlimited.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// A policy making a single attempt.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the delay after the first failure.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the upper bound on any delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the total number of attempts, `0` for unlimited.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Returns the delay before the next attempt after `failures` failed
    /// attempts, or `None` once no attempts remain.
    #[must_use]
    pub fn delay_after(&self, failures: u32) -> Option<Duration> {
        if failures == 0 {
            return Some(Duration::ZERO);
        }
        if self.max_attempts != 0 && failures >= self.max_attempts {
            return None;
        }
        let shift = (failures - 1).min(16);
        Some(self.initial_delay.saturating_mul(1 << shift).min(self.max_delay))
    }
}
