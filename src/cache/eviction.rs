//! TTL expiry plus least-recently-used eviction under a byte budget.

use super::index::VectorIndex;
use chrono::{DateTime, Utc};

/// Outcome of one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub expired: usize,
    pub evicted: usize,
    pub freed_bytes: u64,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    max_size_bytes: u64,
}

impl EvictionPolicy {
    pub fn new(max_size_bytes: u64) -> Self {
        Self { max_size_bytes }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Whether adding `incoming` bytes would take the index over budget.
    pub fn would_exceed<V>(&self, index: &VectorIndex<V>, incoming: u64) -> bool {
        index.size_bytes().saturating_add(incoming) > self.max_size_bytes
    }

    /// Drop expired entries, then evict least-recently-accessed entries until the index
    /// fits the configured budget.
    pub fn prune<V>(&self, index: &mut VectorIndex<V>, now: DateTime<Utc>) -> PruneReport {
        self.prune_to(index, now, self.max_size_bytes)
    }

    /// Same as [`prune`](Self::prune) with an explicit budget, used to make room for an
    /// incoming entry.
    pub fn prune_to<V>(
        &self,
        index: &mut VectorIndex<V>,
        now: DateTime<Utc>,
        budget: u64,
    ) -> PruneReport {
        let before = index.size_bytes();
        let expired = index.remove_where(|e| e.is_expired_at(now)).len();

        let mut evicted = 0;
        if index.size_bytes() > budget {
            // Stable sort: equal recency falls back to scan order.
            let mut by_recency: Vec<(i64, String)> = index
                .iter()
                .map(|e| (e.last_accessed_millis(), e.key.clone()))
                .collect();
            by_recency.sort_by_key(|(accessed, _)| *accessed);

            for (_, key) in by_recency {
                if index.size_bytes() <= budget {
                    break;
                }
                if index.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }

        PruneReport {
            expired,
            evicted,
            freed_bytes: before - index.size_bytes(),
        }
    }
}
