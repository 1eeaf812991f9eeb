//! 弹性模式模块：令牌桶限流与有界重试。
//!
//! # Resilience Primitives Module
//!
//! Admission control and retry policy for outbound calls. Both are consumed by
//! [`crate::transport::HttpTransport`]; no request reaches the network without a token.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Token bucket refilled by a background task |
//! | [`retry`] | Retryable status classification and linear backoff |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use groq_client::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> groq_client::Result<()> {
//! let limiter = RateLimiter::new(RateLimiterConfig::from_rps(10).unwrap())?;
//! let cancel = CancellationToken::new();
//! limiter.acquire(&cancel).await?;
//! // Proceed with request...
//! # Ok(())
//! # }
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterSnapshot};
pub use retry::{is_retryable_status, RetryConfig, RETRYABLE_STATUS};
