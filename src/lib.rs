//! # groq-client
//!
//! 这是 Groq 补全服务客户端的弹性与缓存核心：限流重试传输层加语义响应缓存。
//!
//! Resilience-and-caching core of a Groq (OpenAI-compatible) completion client.
//!
//! ## Overview
//!
//! Two components carry the weight:
//!
//! - **Transport**: every request takes a token from a token-bucket [`RateLimiter`],
//!   then runs through [`HttpTransport`] with bounded linear-backoff retries on
//!   transport errors and on 429/500/502/503/504.
//! - **Semantic cache**: [`SemanticCache`] embeds the request fingerprint and returns a
//!   stored response whose key is similar enough, with TTL expiry, an LRU byte budget,
//!   periodic pruning and crash-safe JSON snapshots.
//!
//! [`CompletionClient`] wires both behind a single `create_chat_completion` call.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groq_client::cache::{SemanticCache, SemanticCacheConfig};
//! use groq_client::types::{ChatCompletionRequest, Message};
//! use groq_client::CompletionClient;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> groq_client::Result<()> {
//!     let cache = Arc::new(SemanticCache::new(SemanticCacheConfig::from_env()).await?);
//!     let client = CompletionClient::builder()
//!         .api_key("gsk_...")
//!         .cache(cache)
//!         .build()?;
//!
//!     let request = ChatCompletionRequest::new(
//!         "llama3-8b-8192",
//!         vec![Message::user("What is the capital of Turkey?")],
//!     );
//!     let cancel = CancellationToken::new();
//!     let resp = client.create_chat_completion(&cancel, &request).await?;
//!     println!("{:?}", resp.first_text());
//!     println!("{:?}", client.cache_stats().await);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Token-bucket rate limiter and retry policy |
//! | [`transport`] | Rate-limited, retrying HTTP transport |
//! | [`embeddings`] | Embedding providers and vector math |
//! | [`cache`] | Semantic cache, eviction and persistence |
//! | [`types`] | Chat messages and completion bodies |
//! | [`client`] | Cached completion client, parallel and batched requests |

pub mod cache;
pub mod client;
pub mod embeddings;
pub mod resilience;
pub mod transport;
pub mod types;
pub mod utils;

pub use cache::{CacheStats, SemanticCache, SemanticCacheConfig};
pub use client::{BatchProcessor, CompletionClient, CompletionClientBuilder, ParallelResponse};
pub use embeddings::{EmbeddingProvider, HashEmbeddingProvider};
pub use resilience::{RateLimiter, RateLimiterConfig, RetryConfig};
pub use transport::{HttpTransport, TransportConfig};
pub use types::{Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
