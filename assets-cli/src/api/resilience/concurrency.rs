//! Client-wide concurrency limiter
//!
//! Semaphore that caps how many HTTP requests are in flight at once across
//! every caller sharing one executor. Permits are held only for the duration
//! of a transport call, never across backoff sleeps.

use super::config::ConcurrencyConfig;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent_requests: usize,
    enabled: bool,
    requests_acquired: Arc<AtomicU64>,
    requests_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    pub fn new(config: &ConcurrencyConfig) -> Self {
        let max_concurrent_requests = config.max_concurrent_requests.max(1);
        let permits = if config.enabled {
            max_concurrent_requests
        } else {
            // Large but valid when disabled (Tokio Semaphore max is 2^61-1)
            1_000_000
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            max_concurrent_requests,
            enabled: config.enabled,
            requests_acquired: Arc::new(AtomicU64::new(0)),
            requests_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wait for a permit. The permit is released when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        if self.enabled && self.semaphore.available_permits() == 0 {
            self.requests_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Concurrency limiter: waiting for permit ({} in use)",
                self.max_concurrent_requests
            );
        }

        let permit = self.semaphore.clone().acquire_owned().await?;
        self.requests_acquired.fetch_add(1, Ordering::Relaxed);
        Ok(permit)
    }

    pub fn available_permits(&self) -> usize {
        if !self.enabled {
            return usize::MAX;
        }
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_concurrent_requests: self.max_concurrent_requests,
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_waited: self.requests_waited.load(Ordering::Relaxed),
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    pub available_permits: usize,
    pub max_concurrent_requests: usize,
    /// Total permits handed out
    pub requests_acquired: u64,
    /// How many acquisitions found the limiter full
    pub requests_waited: u64,
    pub enabled: bool,
}

impl ConcurrencyStats {
    pub fn in_use(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        self.max_concurrent_requests
            .saturating_sub(self.available_permits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, enabled: bool) -> ConcurrencyConfig {
        ConcurrencyConfig {
            workers: 1,
            max_concurrent_requests: max,
            enabled,
        }
    }

    #[tokio::test]
    async fn test_disabled_limiter_never_blocks() {
        let limiter = ConcurrencyLimiter::new(&config(5, false));

        let mut permits = Vec::new();
        for _ in 0..100 {
            permits.push(limiter.acquire().await.unwrap());
        }
        assert_eq!(permits.len(), 100);
        assert_eq!(limiter.available_permits(), usize::MAX);
        assert_eq!(limiter.stats().in_use(), 0);
    }

    #[tokio::test]
    async fn test_permits_return_on_drop() {
        let limiter = ConcurrencyLimiter::new(&config(3, true));

        let held = vec![
            limiter.acquire().await.unwrap(),
            limiter.acquire().await.unwrap(),
            limiter.acquire().await.unwrap(),
        ];
        assert_eq!(limiter.available_permits(), 0);
        assert_eq!(limiter.stats().in_use(), 3);

        drop(held);
        assert_eq!(limiter.available_permits(), 3);
        assert_eq!(limiter.stats().requests_acquired, 3);
    }

    #[test]
    fn test_zero_cap_is_raised_to_one() {
        let limiter = ConcurrencyLimiter::new(&config(0, true));
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_limiter_acquire_waits() {
        let limiter = ConcurrencyLimiter::new(&config(1, true));
        let limiter_clone = limiter.clone();

        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_permits(), 0);

        let handle = tokio::spawn(async move {
            let _permit = limiter_clone.acquire().await.unwrap();
            true
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        drop(permit);

        let result = tokio::time::timeout(tokio::time::Duration::from_millis(500), handle).await;
        assert!(result.is_ok());

        let stats = limiter.stats();
        assert_eq!(stats.requests_acquired, 2);
        assert_eq!(stats.requests_waited, 1);
    }
}
