//! Embedding support for the semantic cache.
//!
//! This module provides:
//! - The [`EmbeddingProvider`] seam and two implementations: an offline,
//!   hash-based fallback and a remote OpenAI-compatible client
//! - Vector operations (cosine similarity, normalization)

mod client;
mod provider;
mod types;
mod vectors;

pub use client::{RemoteEmbeddingProvider, RemoteEmbeddingProviderBuilder};
pub use provider::{EmbeddingProvider, HashEmbeddingProvider, DEFAULT_DIMENSION};
pub use types::{EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use vectors::{cosine_similarity, dot_product, magnitude, normalize, normalize_vector, Vector};
