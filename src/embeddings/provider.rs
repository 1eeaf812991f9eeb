//! Embedding providers.

use super::vectors::{normalize, Vector};
use crate::{Error, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DIMENSION: usize = 128;

/// Maps text to a fixed-dimension, unit-normalized vector.
///
/// Implementations must be deterministic for a given model and dimension, and must
/// return [`Error::Cancelled`] promptly once `cancel` fires. Any other failure should be
/// reported as [`Error::EmbeddingFailed`]; callers never store a vector from a failed call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vector>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;
}

/// Offline fallback provider: SHA-256 of the text expanded into `dimension` components.
///
/// Same text, same vector. Different texts (including case changes) get unrelated
/// vectors, so near-duplicate matching only happens through the similarity threshold,
/// not through any notion of meaning.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    model: String,
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Zero is ignored. Changing the dimension after vectors were stored makes old and
    /// new vectors incomparable (similarity 0); the cache does not migrate them.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.set_dimension(dimension);
        self
    }

    pub fn set_dimension(&mut self, dimension: usize) {
        if dimension > 0 {
            self.dimension = dimension;
        }
    }

    pub fn embed_text(&self, text: &str) -> Vector {
        let hash = Sha256::digest(text.as_bytes());
        let mut vector: Vector = (0..self.dimension)
            .map(|i| {
                let offset = (i * 4) % hash.len();
                let bits = u32::from_be_bytes([
                    hash[offset],
                    hash[offset + 1],
                    hash[offset + 2],
                    hash[offset + 3],
                ]);
                bits as f32 / u32::MAX as f32
            })
            .collect();
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vector> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}
