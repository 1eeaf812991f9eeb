//! Linear-scan nearest-neighbour index over cache entries.
//!
//! Entries and their vectors live in one ordered arena keyed by an insertion sequence,
//! plus a key lookup table. There is no separate vector array to keep in step with the
//! map. Scan order is insertion order; overwriting a key moves it to the end.

use super::entry::CacheEntry;
use crate::embeddings::cosine_similarity;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Best candidate found by [`VectorIndex::best_match`].
#[derive(Debug)]
pub struct Match<'a, V> {
    pub entry: &'a CacheEntry<V>,
    pub similarity: f32,
}

#[derive(Debug)]
pub struct VectorIndex<V> {
    arena: BTreeMap<u64, CacheEntry<V>>,
    slots: HashMap<String, u64>,
    next_seq: u64,
    size_bytes: u64,
}

impl<V> Default for VectorIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VectorIndex<V> {
    pub fn new() -> Self {
        Self {
            arena: BTreeMap::new(),
            slots: HashMap::new(),
            next_seq: 0,
            size_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Sum of `size_bytes` over live entries.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.slots.get(key).and_then(|seq| self.arena.get(seq))
    }

    /// Entries in scan (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<V>> {
        self.arena.values()
    }

    /// Insert at the end of the scan order, returning the entry it replaced.
    pub fn insert(&mut self, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        let replaced = self.remove(&entry.key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.size_bytes += entry.size_bytes;
        self.slots.insert(entry.key.clone(), seq);
        self.arena.insert(seq, entry);
        replaced
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let seq = self.slots.remove(key)?;
        let entry = self.arena.remove(&seq)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    /// Remove every entry matching `pred`, preserving the order of the rest.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<CacheEntry<V>>
    where
        F: FnMut(&CacheEntry<V>) -> bool,
    {
        let doomed: Vec<String> = self
            .arena
            .values()
            .filter(|e| pred(e))
            .map(|e| e.key.clone())
            .collect();
        doomed.iter().filter_map(|k| self.remove(k)).collect()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.slots.clear();
        self.size_bytes = 0;
    }

    /// The live entry with the highest cosine similarity to `query`, if that similarity
    /// is at least `threshold`.
    ///
    /// Expired entries are skipped, not removed. On ties the earliest entry in scan order
    /// wins.
    pub fn best_match(
        &self,
        query: &[f32],
        threshold: f32,
        now: DateTime<Utc>,
    ) -> Option<Match<'_, V>> {
        let mut best: Option<Match<'_, V>> = None;
        for entry in self.arena.values() {
            if entry.is_expired_at(now) {
                continue;
            }
            let similarity = cosine_similarity(query, &entry.embedding);
            if best.as_ref().map_or(true, |b| similarity > b.similarity) {
                best = Some(Match { entry, similarity });
            }
        }
        best.filter(|m| m.similarity >= threshold)
    }
}
