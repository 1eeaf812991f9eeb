//! Behavioural tests for the semantic cache using the offline hash embedding.

mod common;

use groq_client::cache::{SemanticCache, SemanticCacheConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodic pruning off so tests control when pruning happens.
fn config() -> SemanticCacheConfig {
    SemanticCacheConfig::new().with_prune_interval(Duration::ZERO)
}

/// Hash embeddings of unrelated texts are far apart, but not orthogonal; a near-1
/// threshold only matches identical text.
const STRICT: f32 = 0.999;

#[tokio::test]
async fn near_duplicate_matches_with_zero_threshold() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(config().with_similarity_threshold(0.0))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cache
        .set(&cancel, "capital of Turkey?", "Ankara".to_string())
        .await
        .unwrap();

    let hit = cache.get(&cancel, "capital of turkey").await;
    assert_eq!(hit.as_deref(), Some("Ankara"));
}

#[tokio::test]
async fn hash_embedding_is_case_sensitive() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(config().with_similarity_threshold(STRICT))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cache
        .set(&cancel, "capital of Turkey?", "Ankara".to_string())
        .await
        .unwrap();

    assert!(cache.get(&cancel, "capital of turkey").await.is_none());
    assert_eq!(
        cache.get(&cancel, "capital of Turkey?").await.as_deref(),
        Some("Ankara")
    );
    let stats = cache.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.total_requests), (1, 1, 2));
}

#[tokio::test]
async fn best_match_wins_over_earlier_candidates() {
    common::init_tracing();
    let cache = SemanticCache::<u32>::new(config().with_similarity_threshold(0.0))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    for (i, q) in ["alpha", "beta", "gamma", "delta"].iter().enumerate() {
        cache.set(&cancel, q, i as u32).await.unwrap();
    }
    // Exact text has similarity 1.0, so it beats every other entry regardless of order.
    assert_eq!(cache.get(&cancel, "gamma").await, Some(2));
    assert_eq!(cache.get(&cancel, "alpha").await, Some(0));
}

#[tokio::test]
async fn expired_entries_are_invisible_and_pruned() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(config().with_ttl(Duration::from_millis(50)))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cache.set(&cancel, "short-lived", "v".to_string()).await.unwrap();
    assert!(cache.get(&cancel, "short-lived").await.is_some());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(cache.get(&cancel, "short-lived").await.is_none());
    // Still stored until a prune runs.
    assert_eq!(cache.stats().await.item_count, 1);

    let report = cache.prune().await;
    assert_eq!(report.expired, 1);
    let stats = cache.stats().await;
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.size_bytes, 0);
    assert_eq!(stats.evictions, 1);
}

#[tokio::test]
async fn periodic_prune_removes_expired_entries() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(
        SemanticCacheConfig::new()
            .with_ttl(Duration::from_millis(20))
            .with_prune_interval(Duration::from_millis(40)),
    )
    .await
    .unwrap();
    let cancel = CancellationToken::new();
    cache.set(&cancel, "q", "v".to_string()).await.unwrap();

    let mut remaining = 1;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = cache.stats().await.item_count;
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn size_budget_evicts_least_recently_used() {
    common::init_tracing();
    // Each value serializes to exactly 10 bytes ("12345678" plus quotes).
    let value = "12345678".to_string();
    let cache = SemanticCache::<String>::new(
        config()
            .with_max_cache_size(30)
            .with_similarity_threshold(STRICT),
    )
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    for key in ["a", "b", "c"] {
        cache.set(&cancel, key, value.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Reading "a" makes "b" the least recently used entry.
    assert!(cache.get(&cancel, "a").await.is_some());
    tokio::time::sleep(Duration::from_millis(5)).await;

    cache.set(&cancel, "d", value.clone()).await.unwrap();

    let stats = cache.stats().await;
    assert_eq!(stats.item_count, 3);
    assert_eq!(stats.size_bytes, 30);
    assert_eq!(stats.evictions, 1);
    assert!(cache.get(&cancel, "b").await.is_none());
    for key in ["a", "c", "d"] {
        assert!(cache.get(&cancel, key).await.is_some(), "{} should survive", key);
    }
}

#[tokio::test]
async fn clear_resets_contents_but_not_history() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(config().with_similarity_threshold(STRICT))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cache.set(&cancel, "one", "1".to_string()).await.unwrap();
    cache.set(&cancel, "two", "2".to_string()).await.unwrap();
    assert!(cache.get(&cancel, "one").await.is_some());
    assert!(cache.get(&cancel, "three").await.is_none());

    cache.clear(&cancel).await.unwrap();

    let stats = cache.stats().await;
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.size_bytes, 0);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(cache.get(&cancel, "one").await.is_none());
}

#[tokio::test]
async fn cancelled_lookup_is_a_miss() {
    common::init_tracing();
    let cache = SemanticCache::<String>::new(config()).await.unwrap();
    let live = CancellationToken::new();
    cache.set(&live, "q", "v".to_string()).await.unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(cache.get(&cancelled, "q").await.is_none());
    assert_eq!(cache.stats().await.misses, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_set_and_get() {
    common::init_tracing();
    let cache = Arc::new(
        SemanticCache::<u64>::new(config().with_similarity_threshold(STRICT))
            .await
            .unwrap(),
    );

    let tasks = (0..32u64).map(|i| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let key = format!("question #{}", i);
            cache.set(&cancel, &key, i).await.unwrap();
            cache.get(&cancel, &key).await
        })
    });
    let results = futures::future::join_all(tasks).await;

    for (i, r) in results.into_iter().enumerate() {
        assert_eq!(r.unwrap(), Some(i as u64));
    }
    let stats = cache.stats().await;
    assert_eq!(stats.item_count, 32);
    assert_eq!(stats.hits, 32);
    assert_eq!(stats.misses, 0);
}
