//! Semantic cache configuration.

use crate::utils::env_parse;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EMBEDDING_MODEL: &str = "llama3-8b-8192";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticCacheConfig {
    /// Soft cap. Exceeding it is logged, never enforced; the byte budget is what evicts.
    pub max_entries: usize,
    /// Minimum cosine similarity for a hit, in `[0, 1]`.
    pub similarity_threshold: f32,
    #[serde(with = "crate::utils::duration_ms")]
    pub ttl: Duration,
    pub embedding_model: String,
    /// Byte budget over the serialized size of all stored values.
    pub max_cache_size: u64,
    /// When false, hit/miss/eviction counters stay at zero. Size and item count are
    /// always tracked.
    pub enable_metrics: bool,
    /// Zero disables the periodic prune task.
    #[serde(with = "crate::utils::duration_ms")]
    pub prune_interval: Duration,
    /// `None` disables persistence.
    pub persist_path: Option<PathBuf>,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            similarity_threshold: 0.85,
            ttl: Duration::from_secs(24 * 60 * 60),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            max_cache_size: 1 << 30,
            enable_metrics: true,
            prune_interval: Duration::from_secs(60 * 60),
            persist_path: None,
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides (`GROQ_CACHE_TTL_SECS`,
    /// `GROQ_CACHE_SIMILARITY_THRESHOLD`, `GROQ_CACHE_MAX_SIZE_BYTES`,
    /// `GROQ_CACHE_PRUNE_INTERVAL_SECS`, `GROQ_CACHE_PERSIST_PATH`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_parse::<u64>("GROQ_CACHE_TTL_SECS") {
            cfg.ttl = Duration::from_secs(secs);
        }
        if let Some(threshold) = env_parse::<f32>("GROQ_CACHE_SIMILARITY_THRESHOLD") {
            cfg.similarity_threshold = threshold;
        }
        if let Some(bytes) = env_parse::<u64>("GROQ_CACHE_MAX_SIZE_BYTES") {
            cfg.max_cache_size = bytes;
        }
        if let Some(secs) = env_parse::<u64>("GROQ_CACHE_PRUNE_INTERVAL_SECS") {
            cfg.prune_interval = Duration::from_secs(secs);
        }
        if let Ok(path) = std::env::var("GROQ_CACHE_PERSIST_PATH") {
            cfg = cfg.with_persist_path(path);
        }
        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid cache config: {}", e),
                ErrorContext::new().with_source("semantic_cache_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_max_cache_size(mut self, bytes: u64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }

    /// An empty path disables persistence.
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.persist_path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::configuration_with_context(
                "similarity_threshold must be within [0, 1]",
                ErrorContext::new()
                    .with_field_path("cache.similarity_threshold")
                    .with_details(format!("got {}", self.similarity_threshold)),
            ));
        }
        if self.ttl.is_zero() {
            return Err(Error::configuration_with_context(
                "ttl must be positive",
                ErrorContext::new().with_field_path("cache.ttl"),
            ));
        }
        if self.max_cache_size == 0 {
            return Err(Error::configuration_with_context(
                "max_cache_size must be positive",
                ErrorContext::new().with_field_path("cache.max_cache_size"),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "embedding_model must not be empty",
                ErrorContext::new().with_field_path("cache.embedding_model"),
            ));
        }
        Ok(())
    }
}
