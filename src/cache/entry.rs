//! Cache entries and their persisted form.

use crate::embeddings::Vector;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Anything the cache can store: it must round-trip through JSON (size accounting and
/// snapshots) and be cheap enough to clone out on a hit.
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A stored response keyed by its request fingerprint.
///
/// `last_accessed` and `access_count` are atomics so a hit can record itself while
/// holding only the shared lock.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub ttl: Duration,
    last_accessed_ms: AtomicI64,
    access_count: AtomicU64,
}

impl<V> CacheEntry<V> {
    pub fn new(
        key: impl Into<String>,
        value: V,
        embedding: Vector,
        size_bytes: u64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            embedding,
            created_at: now,
            size_bytes,
            ttl,
            last_accessed_ms: AtomicI64::new(now.timestamp_millis()),
            access_count: AtomicU64::new(0),
        }
    }

    /// `now - created_at > ttl`; an entry is still live at exactly its TTL.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now.timestamp_millis() - self.created_at.timestamp_millis();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        age_ms > ttl_ms
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_accessed_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_accessed_millis(&self) -> i64 {
        self.last_accessed_ms.load(Ordering::Relaxed)
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_accessed_millis())
            .single()
            .unwrap_or(self.created_at)
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }
}

impl<V: Clone> CacheEntry<V> {
    pub fn to_persisted(&self) -> PersistedEntry<V> {
        PersistedEntry {
            value: self.value.clone(),
            embedding: self.embedding.clone(),
            created_at: self.created_at,
            last_accessed: self.last_accessed(),
            access_count: self.access_count(),
            size_bytes: self.size_bytes,
            ttl: self.ttl,
        }
    }
}

/// One record of the snapshot document (`key -> PersistedEntry`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedEntry<V> {
    pub value: V,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub size_bytes: u64,
    #[serde(with = "crate::utils::duration_ms")]
    pub ttl: Duration,
}

impl<V> PersistedEntry<V> {
    pub fn into_entry(self, key: impl Into<String>) -> CacheEntry<V> {
        let entry = CacheEntry::new(
            key,
            self.value,
            self.embedding,
            self.size_bytes,
            self.ttl,
            self.created_at,
        );
        entry
            .last_accessed_ms
            .store(self.last_accessed.timestamp_millis(), Ordering::Relaxed);
        entry
            .access_count
            .store(self.access_count, Ordering::Relaxed);
        entry
    }
}
