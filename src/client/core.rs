use super::batch::{self, BatchProcessor, ParallelResponse};
use crate::cache::{CacheStats, SemanticCache};
use crate::transport::{HttpTransport, Method};
use crate::types::{fingerprint, ChatCompletionRequest, ChatCompletionResponse};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat completion client with an optional semantic cache in front of the transport.
pub struct CompletionClient {
    pub(super) transport: Arc<HttpTransport>,
    pub(super) cache: Option<Arc<SemanticCache<ChatCompletionResponse>>>,
    pub(super) endpoint: String,
}

impl CompletionClient {
    pub fn builder() -> super::CompletionClientBuilder {
        super::CompletionClientBuilder::new()
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn cache(&self) -> Option<&Arc<SemanticCache<ChatCompletionResponse>>> {
        self.cache.as_ref()
    }

    /// Answer from the cache when the final message is close enough to one already
    /// answered; otherwise call `/chat/completions` and remember the result.
    ///
    /// Cache failures never fail the call.
    pub async fn create_chat_completion(
        &self,
        cancel: &CancellationToken,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let key = self
            .cache
            .as_ref()
            .and_then(|_| fingerprint(&request.messages));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(resp) = cache.get(cancel, key).await {
                debug!(model = request.model.as_str(), "completion served from cache");
                return Ok(resp);
            }
        }

        let resp: ChatCompletionResponse = self
            .transport
            .execute_json(cancel, Method::POST, &self.endpoint, Some(request), None)
            .await?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Err(e) = cache.set(cancel, key, resp.clone()).await {
                warn!(error = %e, "failed to cache completion");
            }
        }
        Ok(resp)
    }

    /// Send every request concurrently. The transport's rate limiter paces them; results
    /// keep input order and failures are reported per request.
    pub async fn create_parallel_completions(
        &self,
        cancel: &CancellationToken,
        requests: &[ChatCompletionRequest],
    ) -> Vec<ParallelResponse> {
        batch::complete_all(self, cancel, requests, 0, requests.len()).await
    }

    pub fn batch_processor(&self, batch_size: usize, max_parallel: usize) -> BatchProcessor<'_> {
        BatchProcessor::new(self, batch_size, max_parallel)
    }

    /// No-op without a cache.
    pub async fn clear_cache(&self, cancel: &CancellationToken) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clear(cancel).await,
            None => Ok(()),
        }
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }
}
