use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub capacity: u32,
    /// Tokens that can be taken right now without waiting.
    pub available: u32,
    /// Time between two refills.
    pub refill_period: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Bucket capacity; also the number of tokens refilled per second.
    pub requests_per_second: u32,
}

impl RateLimiterConfig {
    pub fn from_rps(rps: u32) -> Option<Self> {
        if rps == 0 {
            return None;
        }
        Some(Self {
            requests_per_second: rps,
        })
    }

    /// One token every `1 / capacity` seconds.
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second.max(1)
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
        }
    }
}

/// Token-bucket rate limiter.
///
/// - Starts full (`capacity` tokens)
/// - A background task adds one token per refill period; refills into a full bucket are dropped
/// - Waiters are served in FIFO order
///
/// Must be created inside a Tokio runtime. The refill task stops when the limiter is dropped.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    bucket: Arc<Semaphore>,
    refill: Option<JoinHandle<()>>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Result<Self> {
        if cfg.requests_per_second == 0 {
            return Err(Error::configuration_with_context(
                "requests_per_second must be greater than zero",
                ErrorContext::new()
                    .with_field_path("rate_limiter.requests_per_second")
                    .with_source("rate_limiter"),
            ));
        }
        let capacity = cfg.requests_per_second as usize;
        let bucket = Arc::new(Semaphore::new(capacity));
        let refill = tokio::spawn(refill_loop(
            Arc::downgrade(&bucket),
            capacity,
            cfg.refill_period(),
        ));
        Ok(Self {
            cfg,
            bucket,
            refill: Some(refill),
        })
    }

    /// A bucket that is never refilled. Useful for fixed budgets and tests.
    pub fn without_refill(capacity: u32) -> Self {
        Self {
            cfg: RateLimiterConfig {
                requests_per_second: capacity,
            },
            bucket: Arc::new(Semaphore::new(capacity as usize)),
            refill: None,
        }
    }

    /// Acquire one token, waiting for a refill if the bucket is empty.
    ///
    /// Fails with [`Error::Cancelled`] as soon as `cancel` fires; a cancelled waiter
    /// never consumes a token.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            permit = self.bucket.acquire() => {
                let permit = permit.map_err(|_| {
                    Error::runtime_with_context(
                        "token bucket closed",
                        ErrorContext::new().with_source("rate_limiter"),
                    )
                })?;
                // Tokens are consumed, not returned: only the refill task puts them back.
                permit.forget();
                Ok(())
            }
        }
    }

    /// Try to acquire a token without waiting, returns true if successful
    pub fn try_acquire(&self) -> bool {
        match self.bucket.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        RateLimiterSnapshot {
            capacity: self.cfg.requests_per_second,
            available: self.bucket.available_permits() as u32,
            refill_period: self.cfg.refill_period(),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.refill.take() {
            handle.abort();
        }
    }
}

async fn refill_loop(bucket: Weak<Semaphore>, capacity: usize, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the bucket starts full.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(bucket) = bucket.upgrade() else {
            break;
        };
        // Only this task adds permits, so check-then-add cannot overshoot.
        if bucket.available_permits() < capacity {
            bucket.add_permits(1);
        } else {
            trace!("token bucket full, refill dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_from_rps() {
        let config = RateLimiterConfig::from_rps(10).unwrap();
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.refill_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_rate_limiter_config_from_rps_invalid() {
        assert!(RateLimiterConfig::from_rps(0).is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_rejects_zero_capacity() {
        let result = RateLimiter::new(RateLimiterConfig {
            requests_per_second: 0,
        });
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_rate_limiter_initial_burst() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(5).unwrap()).unwrap();
        let snapshot = limiter.snapshot();
        assert_eq!(snapshot.capacity, 5);
        assert_eq!(snapshot.available, 5);
    }

    #[tokio::test]
    async fn test_rate_limiter_try_acquire_drains_bucket() {
        let limiter = RateLimiter::without_refill(3);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());

        // Fourth should fail (no tokens left)
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_blocks_past_capacity_until_refill() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(4).unwrap()).unwrap();
        let cancel = CancellationToken::new();

        for _ in 0..4 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(limiter.snapshot().available, 0);

        // Next token arrives after 250ms.
        let early = tokio::time::timeout(Duration::from_millis(100), limiter.acquire(&cancel)).await;
        assert!(early.is_err());

        let late = tokio::time::timeout(Duration::from_millis(300), limiter.acquire(&cancel)).await;
        assert!(late.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_refill_never_exceeds_capacity() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(2).unwrap()).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(limiter.snapshot().available, 2);
    }

    #[tokio::test]
    async fn test_rate_limiter_cancelled_waiter() {
        let limiter = RateLimiter::without_refill(1);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter_cancel = cancel.child_token();
        let trigger = waiter_cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let result = limiter.acquire(&waiter_cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_rate_limiter_already_cancelled() {
        let limiter = RateLimiter::without_refill(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(limiter.acquire(&cancel).await, Err(Error::Cancelled)));
        // The token was not consumed.
        assert_eq!(limiter.snapshot().available, 1);
    }
}
