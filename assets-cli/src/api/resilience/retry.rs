//! Retry policy with exponential backoff
//!
//! Delays double on every attempt (`initial_delay * 2^attempt`) and are
//! capped at `max_delay`. A server `Retry-After` hint replaces the computed
//! delay as-is when honoured.

use rand::Rng;
use std::time::Duration;

/// Backoff growth factor between consecutive retries
pub const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Prefer the server's `Retry-After` over the computed delay
    pub honor_retry_after: bool,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
    /// Pause after a success that reports the caller is close to its limit
    pub near_limit_pause: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            honor_retry_after: true,
            jitter: false,
            near_limit_pause: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn conservative() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            honor_retry_after: true,
            jitter: true,
            near_limit_pause: Duration::from_secs(2),
        }
    }

    pub fn aggressive() -> Self {
        Self {
            max_retries: 8,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(16),
            honor_retry_after: true,
            jitter: true,
            near_limit_pause: Duration::from_millis(500),
        }
    }

    /// `min(initial_delay * 2^attempt, max_delay)` for a zero-based attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = BACKOFF_MULTIPLIER.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Decides whether and how long to wait before the next attempt
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether a transient failure on `attempt` (zero-based) may be retried
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.config.max_retries
    }

    /// Delay before retrying after `attempt` failed
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = match retry_after {
            Some(hint) if self.config.honor_retry_after => hint,
            _ => self.config.backoff_delay(attempt),
        };

        if self.config.jitter && !base.is_zero() {
            let factor: f64 = rand::rng().random_range(0.0..0.1);
            base + base.mul_f64(factor)
        } else {
            base
        }
    }
}
