//! Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.

use super::provider::{EmbeddingProvider, DEFAULT_DIMENSION};
use super::types::{EmbeddingRequest, EmbeddingResponse};
use super::vectors::{normalize, Vector};
use crate::transport::{HttpTransport, Method};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Calls a remote embedding endpoint through the shared [`HttpTransport`], so embedding
/// traffic obeys the same rate limit and retry policy as completions.
pub struct RemoteEmbeddingProvider {
    transport: Arc<HttpTransport>,
    endpoint: String,
    model: String,
    dimension: usize,
    request_dimensions: bool,
}

impl RemoteEmbeddingProvider {
    pub fn builder() -> RemoteEmbeddingProviderBuilder {
        RemoteEmbeddingProviderBuilder::new()
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vector> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.request_dimensions.then_some(self.dimension),
        };
        let response: EmbeddingResponse = self
            .transport
            .execute_json(cancel, Method::POST, &self.endpoint, Some(&request), None)
            .await
            .map_err(|e| match e {
                Error::Cancelled | Error::RateLimitExceeded => Error::Cancelled,
                other => Error::embedding_with_context(
                    format!("embedding request failed: {}", other),
                    ErrorContext::new()
                        .with_source("remote_embedding_provider")
                        .with_details(self.endpoint.clone()),
                ),
            })?;

        let mut vector = response
            .into_first()
            .ok_or_else(|| Error::embedding("embedding response contained no vectors"))?;
        if vector.len() != self.dimension {
            return Err(Error::embedding_with_context(
                format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                ),
                ErrorContext::new()
                    .with_field_path("embedding.dimension")
                    .with_source("remote_embedding_provider"),
            ));
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct RemoteEmbeddingProviderBuilder {
    transport: Option<Arc<HttpTransport>>,
    base_url: Option<String>,
    model: Option<String>,
    dimension: usize,
    request_dimensions: bool,
}

impl RemoteEmbeddingProviderBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            base_url: None,
            model: None,
            dimension: DEFAULT_DIMENSION,
            request_dimensions: false,
        }
    }

    pub fn transport(mut self, transport: Arc<HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Base URL without the `/embeddings` suffix, e.g. `https://api.openai.com/v1`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Send `dimensions` in the request body (for models that support truncation).
    pub fn request_dimensions(mut self, enabled: bool) -> Self {
        self.request_dimensions = enabled;
        self
    }

    pub fn build(self) -> Result<RemoteEmbeddingProvider> {
        let transport = self
            .transport
            .ok_or_else(|| Error::configuration("Transport must be specified"))?;
        let model = self
            .model
            .ok_or_else(|| Error::configuration("Model must be specified"))?;
        let base_url = self
            .base_url
            .ok_or_else(|| Error::configuration("Base URL must be specified"))?;
        let base = url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid embedding base URL: {}", e),
                ErrorContext::new().with_field_path("embedding.base_url"),
            )
        })?;
        if self.dimension == 0 {
            return Err(Error::configuration("Embedding dimension must be positive"));
        }
        Ok(RemoteEmbeddingProvider {
            transport,
            endpoint: format!("{}/embeddings", base.as_str().trim_end_matches('/')),
            model,
            dimension: self.dimension,
            request_dimensions: self.request_dimensions,
        })
    }
}

impl Default for RemoteEmbeddingProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
