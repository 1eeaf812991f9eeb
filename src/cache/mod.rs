//! 语义缓存模块：按嵌入向量相似度复用上游响应。
//!
//! # Semantic Response Cache
//!
//! Avoids repeating expensive completion calls for requests that are semantically
//! close to one already answered.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SemanticCache`] | Get/Set/Delete/Clear/Stats over embedding similarity |
//! | [`SemanticCacheConfig`] | Threshold, TTL, byte budget, pruning and persistence options |
//! | [`VectorIndex`] | Linear-scan nearest-neighbour search in insertion order |
//! | [`EvictionPolicy`] | TTL expiry then least-recently-used eviction under the budget |
//! | [`Persister`] | Crash-safe JSON snapshot of the entry set |
//!
//! ## Example
//!
//! ```rust,no_run
//! use groq_client::cache::{SemanticCache, SemanticCacheConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> groq_client::Result<()> {
//! let cache = SemanticCache::<String>::new(SemanticCacheConfig::default()).await?;
//! let cancel = CancellationToken::new();
//!
//! cache.set(&cancel, "capital of Turkey?", "Ankara".to_string()).await?;
//! if let Some(answer) = cache.get(&cancel, "capital of Turkey?").await {
//!     println!("cached: {answer}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The built-in [`HashEmbeddingProvider`](crate::embeddings::HashEmbeddingProvider) only
//! matches identical text (or anything, with a threshold of 0). Plug in a real model via
//! [`SemanticCache::with_provider`] for meaning-level matches.

mod config;
mod entry;
mod eviction;
mod index;
mod persist;
mod semantic;

pub use config::{SemanticCacheConfig, DEFAULT_EMBEDDING_MODEL};
pub use entry::{CacheEntry, CacheValue, PersistedEntry};
pub use eviction::{EvictionPolicy, PruneReport};
pub use index::{Match, VectorIndex};
pub use persist::{Persister, Snapshot};
pub use semantic::{CacheStats, SemanticCache};
