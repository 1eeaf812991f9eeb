//! Retry policy
//!
//! Bounded retry with linear backoff. The policy only decides *whether* and *how long*;
//! the attempt loop itself lives in [`crate::transport::HttpTransport`].

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Statuses that are retried like a transport failure.
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS.contains(&status)
}

/// Configuration for retry logic. Immutable once the transport is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Base delay; the n-th retry waits `base_delay * n`.
    #[serde(with = "crate::utils::duration_ms")]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration) -> Result<Self> {
        let cfg = Self {
            max_retries,
            base_delay,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(Error::configuration_with_context(
                "retry base delay must be positive",
                ErrorContext::new()
                    .with_field_path("retry.base_delay")
                    .with_source("retry_config"),
            ));
        }
        Ok(())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based). `None` once the budget is spent.
    pub fn backoff(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        Some(self.base_delay.saturating_mul(retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{} should be retryable", status);
        }
        for status in [200, 201, 400, 401, 404, 501] {
            assert!(!is_retryable_status(status), "{} should not be retryable", status);
        }
    }

    #[test]
    fn test_backoff_is_linear() {
        let cfg = RetryConfig::new(3, Duration::from_millis(100)).unwrap();
        assert_eq!(cfg.backoff(1), Some(Duration::from_millis(100)));
        assert_eq!(cfg.backoff(2), Some(Duration::from_millis(200)));
        assert_eq!(cfg.backoff(3), Some(Duration::from_millis(300)));
        assert_eq!(cfg.backoff(4), None);
        assert_eq!(cfg.backoff(0), None);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let cfg = RetryConfig::new(0, Duration::from_millis(1)).unwrap();
        assert_eq!(cfg.max_attempts(), 1);
        assert_eq!(cfg.backoff(1), None);
    }

    #[test]
    fn test_zero_base_delay_rejected() {
        assert!(RetryConfig::new(3, Duration::ZERO).is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_delay, Duration::from_secs(1));
    }
}
