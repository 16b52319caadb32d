//! Retry policy for execution attempts

use chrono::Duration;

/// Bounded linear backoff: attempt `n` waits `n * base_delay` before the job
/// is runnable again, and the `max_attempts`-th failure is final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::seconds(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay after the `attempt`-th failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * i32::try_from(attempt).unwrap_or(i32::MAX)
    }

    /// Whether a job that has now made `attempt_count` attempts is out of retries
    pub fn is_exhausted(&self, attempt_count: u32) -> bool {
        attempt_count >= self.max_attempts
    }
}
