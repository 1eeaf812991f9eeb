use super::core::{CompletionClient, DEFAULT_BASE_URL};
use crate::cache::SemanticCache;
use crate::transport::{HttpExecutor, HttpTransport, TransportConfig};
use crate::types::ChatCompletionResponse;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for [`CompletionClient`].
///
/// Without an explicit config, transport settings come from the environment
/// ([`TransportConfig::from_env`]).
pub struct CompletionClientBuilder {
    api_key: Option<String>,
    base_url: String,
    transport_config: Option<TransportConfig>,
    executor: Option<Arc<dyn HttpExecutor>>,
    transport: Option<Arc<HttpTransport>>,
    cache: Option<Arc<SemanticCache<ChatCompletionResponse>>>,
}

impl CompletionClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            transport_config: None,
            executor: None,
            transport: None,
            cache: None,
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API root (mock servers, proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    /// Replace the reqwest-based execution primitive.
    pub fn executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Reuse an existing transport (and its rate limiter). Takes precedence over
    /// `transport_config`, `executor` and `api_key`.
    pub fn transport(mut self, transport: Arc<HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cache(mut self, cache: Arc<SemanticCache<ChatCompletionResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<CompletionClient> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("client.base_url")
                    .with_details(self.base_url.clone()),
            )
        })?;
        let endpoint = format!("{}/chat/completions", base.as_str().trim_end_matches('/'));

        let transport = match self.transport {
            Some(t) => t,
            None => {
                let mut config = self.transport_config.unwrap_or_else(TransportConfig::from_env);
                if let Some(key) = &self.api_key {
                    config = config.with_api_key(key);
                }
                let has_auth = config
                    .base_headers
                    .keys()
                    .any(|k| k.eq_ignore_ascii_case("authorization"));
                if !has_auth {
                    return Err(Error::configuration_with_context(
                        "API key must be specified",
                        ErrorContext::new().with_field_path("client.api_key"),
                    ));
                }
                let transport = match self.executor {
                    Some(executor) => HttpTransport::with_executor(config, executor)?,
                    None => HttpTransport::new(config)?,
                };
                Arc::new(transport)
            }
        };

        Ok(CompletionClient {
            transport,
            cache: self.cache,
            endpoint,
        })
    }
}

impl Default for CompletionClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
