//! Backoff policy for rate-limited (429) responses.

use std::time::Duration;

use crate::error::ClientError;

/// How many times to send a request that keeps being rate limited, and how
/// long to wait in between.
///
/// The wait before attempt `n + 1` is `base_delay * 2^(n-1)` unless the
/// server sent a `Retry-After` header, which always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, ClientError> {
        if max_attempts == 0 {
            return Err(ClientError::Configuration(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if base_delay.is_zero() {
            return Err(ClientError::Configuration(
                "retry policy base delay must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Exponential delay after the given 1-based attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Delay after `attempt`, honoring a server-provided `Retry-After`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Blocks the calling operation for a backoff interval.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
