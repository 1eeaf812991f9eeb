//! Semantic response cache.

use super::config::SemanticCacheConfig;
use super::entry::{CacheEntry, CacheValue};
use super::eviction::{EvictionPolicy, PruneReport};
use super::index::VectorIndex;
use super::persist::{PersistQueue, Persister, Snapshot};
use crate::embeddings::{EmbeddingProvider, HashEmbeddingProvider, Vector};
use crate::{Error, ErrorContext, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, RwLockWriteGuard};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub size_bytes: u64,
    pub item_count: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Metrics {
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    total_requests: AtomicU64,
}

impl Metrics {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        if self.enabled {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.total_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_miss(&self) {
        if self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.total_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_evictions(&self, n: usize) {
        if self.enabled && n > 0 {
            self.evictions.fetch_add(n as u64, Ordering::Relaxed);
        }
    }
}

struct Shared<V> {
    config: SemanticCacheConfig,
    provider: Arc<dyn EmbeddingProvider>,
    policy: EvictionPolicy,
    // Entries, vectors and size accounting; counters are only touched while a guard is held.
    index: RwLock<VectorIndex<V>>,
    metrics: Metrics,
    persister: Option<Persister>,
    persist_queue: Option<PersistQueue>,
}

impl<V: CacheValue> Shared<V> {
    async fn embed(&self, cancel: &CancellationToken, text: &str) -> Result<Vector> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.provider.embed(cancel, text) => result,
        }
    }

    async fn prune(&self) -> PruneReport {
        let report = {
            let mut index = self.index.write().await;
            let report = self.policy.prune(&mut index, Utc::now());
            self.metrics.record_evictions(report.removed());
            if report.removed() > 0 {
                info!(
                    expired = report.expired,
                    evicted = report.evicted,
                    freed_bytes = report.freed_bytes,
                    size_bytes = index.size_bytes(),
                    items = index.len(),
                    "semantic cache pruned"
                );
            }
            report
        };
        if report.removed() > 0 {
            self.request_persist();
        }
        report
    }

    fn request_persist(&self) {
        if let Some(queue) = &self.persist_queue {
            if !queue.request() {
                debug!("cache snapshot already pending");
            }
        }
    }

    async fn save_snapshot(&self) -> Result<()> {
        let Some(persister) = &self.persister else {
            return Ok(());
        };
        let snapshot: Snapshot<V> = {
            let index = self.index.read().await;
            index
                .iter()
                .map(|e| (e.key.clone(), e.to_persisted()))
                .collect()
        };
        persister.save(&snapshot).await
    }

    async fn restore(&self) -> Result<usize> {
        let Some(persister) = &self.persister else {
            return Ok(0);
        };
        let now = Utc::now();
        let records = persister.load::<V>(now).await?;
        let mut index = self.index.write().await;
        for (key, record) in records {
            index.insert(record.into_entry(key));
        }
        if index.size_bytes() > self.policy.max_size_bytes() {
            let report = self.policy.prune(&mut index, now);
            self.metrics.record_evictions(report.removed());
        }
        Ok(index.len())
    }
}

/// Embedding-keyed response cache with TTL expiry, a byte budget, and optional snapshot
/// persistence.
///
/// A lookup embeds the query and returns the stored value whose key embedding is most
/// similar, provided the similarity reaches the configured threshold. All state sits
/// behind one reader/writer lock: lookups share it; inserts, deletes and pruning take it
/// exclusively.
///
/// Construction spawns background tasks (periodic pruning, snapshot writer) and therefore
/// must happen inside a Tokio runtime. They stop when the cache is dropped. Call
/// [`flush`](Self::flush) before shutdown if the last writes must reach disk.
pub struct SemanticCache<V: CacheValue> {
    shared: Arc<Shared<V>>,
    shutdown: CancellationToken,
}

impl<V: CacheValue> SemanticCache<V> {
    /// Cache backed by the offline [`HashEmbeddingProvider`].
    pub async fn new(config: SemanticCacheConfig) -> Result<Self> {
        let provider = Arc::new(HashEmbeddingProvider::new(config.embedding_model.clone()));
        Self::with_provider(config, provider).await
    }

    pub async fn with_provider(
        config: SemanticCacheConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        if provider.dimension() == 0 {
            return Err(Error::configuration_with_context(
                "embedding provider reports a zero dimension",
                ErrorContext::new().with_source(provider.model().to_string()),
            ));
        }

        let persister = config.persist_path.clone().map(Persister::new);
        let (persist_queue, persist_rx) = if persister.is_some() {
            let (queue, rx) = PersistQueue::channel();
            (Some(queue), Some(rx))
        } else {
            (None, None)
        };

        let shared = Arc::new(Shared {
            policy: EvictionPolicy::new(config.max_cache_size),
            metrics: Metrics::new(config.enable_metrics),
            index: RwLock::new(VectorIndex::new()),
            provider,
            persister,
            persist_queue,
            config,
        });

        match shared.restore().await {
            Ok(0) => {}
            Ok(restored) => info!(restored, "semantic cache restored from snapshot"),
            Err(e) => warn!(error = %e, "failed to restore semantic cache, starting empty"),
        }

        let shutdown = CancellationToken::new();
        if let Some(rx) = persist_rx {
            tokio::spawn(persist_worker(Arc::downgrade(&shared), rx));
        }
        if !shared.config.prune_interval.is_zero() {
            tokio::spawn(prune_loop(
                Arc::downgrade(&shared),
                shared.config.prune_interval,
                shutdown.clone(),
            ));
        }

        Ok(Self { shared, shutdown })
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.shared.config
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.shared.provider
    }

    /// Look up the value stored under the most similar key.
    ///
    /// Never fails: an embedding error or cancellation counts as a miss.
    pub async fn get(&self, cancel: &CancellationToken, query: &str) -> Option<V> {
        let embedding = match self.shared.embed(cancel, query).await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "query embedding failed, treating as miss");
                None
            }
        };

        let index = self.shared.index.read().await;
        let Some(embedding) = embedding else {
            self.shared.metrics.record_miss();
            return None;
        };

        let now = Utc::now();
        match index.best_match(&embedding, self.shared.config.similarity_threshold, now) {
            Some(m) => {
                m.entry.touch(now);
                self.shared.metrics.record_hit();
                debug!(similarity = m.similarity, key = m.entry.key.as_str(), "semantic cache hit");
                Some(m.entry.value.clone())
            }
            None => {
                self.shared.metrics.record_miss();
                debug!(items = index.len(), "semantic cache miss");
                None
            }
        }
    }

    /// Store `value` under `query`, replacing any entry with the same key.
    ///
    /// Fails without touching the cache if the query cannot be embedded. When the new
    /// entry would exceed the byte budget, a pruning pass makes room first. A value whose
    /// serialized size alone exceeds the budget is not stored, and any earlier entry under
    /// the same key is removed.
    pub async fn set(&self, cancel: &CancellationToken, query: &str, value: V) -> Result<()> {
        let embedding = self.shared.embed(cancel, query).await?;
        let dimension = self.shared.provider.dimension();
        if embedding.len() != dimension {
            return Err(Error::embedding_with_context(
                format!(
                    "embedding has {} components, expected {}",
                    embedding.len(),
                    dimension
                ),
                ErrorContext::new()
                    .with_field_path("cache.embedding")
                    .with_source(self.shared.provider.model().to_string()),
            ));
        }

        let size_bytes = serde_json::to_vec(&value)?.len() as u64;
        let budget = self.shared.policy.max_size_bytes();
        if size_bytes > budget {
            // The previous value for this key is stale either way.
            let stale = self.write_index(cancel).await?.remove(query).is_some();
            warn!(
                size_bytes,
                budget,
                replaced = stale,
                "value larger than the cache budget, not cached"
            );
            if stale {
                self.shared.request_persist();
            }
            return Ok(());
        }

        {
            let mut index = self.write_index(cancel).await?;
            let now = Utc::now();
            index.remove(query);
            if self.shared.policy.would_exceed(&index, size_bytes) {
                let report = self.shared.policy.prune_to(&mut index, now, budget - size_bytes);
                self.shared.metrics.record_evictions(report.removed());
                debug!(
                    expired = report.expired,
                    evicted = report.evicted,
                    freed_bytes = report.freed_bytes,
                    "made room for new cache entry"
                );
            }
            index.insert(CacheEntry::new(
                query,
                value,
                embedding,
                size_bytes,
                self.shared.config.ttl,
                now,
            ));
            if index.len() > self.shared.config.max_entries {
                debug!(
                    items = index.len(),
                    max_entries = self.shared.config.max_entries,
                    "semantic cache above its soft entry cap"
                );
            }
        }

        self.shared.request_persist();
        Ok(())
    }

    /// Remove the entry stored under exactly `key`. Returns whether one existed.
    pub async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<bool> {
        Ok(self.write_index(cancel).await?.remove(key).is_some())
    }

    /// Drop every entry. Hit/miss history is kept and nothing is persisted.
    pub async fn clear(&self, cancel: &CancellationToken) -> Result<()> {
        let mut index = self.write_index(cancel).await?;
        let items = index.len();
        index.clear();
        debug!(items, "semantic cache cleared");
        Ok(())
    }

    async fn write_index(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RwLockWriteGuard<'_, VectorIndex<V>>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            guard = self.shared.index.write() => Ok(guard),
        }
    }

    /// Consistent snapshot: taken with the lock held exclusively, so no lookup is
    /// half-counted.
    pub async fn stats(&self) -> CacheStats {
        let index = self.shared.index.write().await;
        let m = &self.shared.metrics;
        CacheStats {
            hits: m.hits.load(Ordering::Relaxed),
            misses: m.misses.load(Ordering::Relaxed),
            evictions: m.evictions.load(Ordering::Relaxed),
            total_requests: m.total_requests.load(Ordering::Relaxed),
            size_bytes: index.size_bytes(),
            item_count: index.len(),
        }
    }

    /// Run one pruning pass now (TTL expiry, then LRU down to the byte budget).
    pub async fn prune(&self) -> PruneReport {
        self.shared.prune().await
    }

    /// Write the current entry set to the snapshot file, bypassing the background queue.
    /// A no-op when persistence is disabled.
    pub async fn flush(&self) -> Result<()> {
        self.shared.save_snapshot().await
    }
}

impl<V: CacheValue> Drop for SemanticCache<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn persist_worker<V: CacheValue>(shared: Weak<Shared<V>>, mut rx: mpsc::Receiver<()>) {
    while rx.recv().await.is_some() {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if let Err(e) = shared.save_snapshot().await {
            warn!(error = %e, "background cache persistence failed");
        }
    }
}

async fn prune_loop<V: CacheValue>(
    shared: Weak<Shared<V>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.prune().await;
    }
}
