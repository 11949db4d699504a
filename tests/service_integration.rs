//! End-to-end service tests
//!
//! Exercise the full stack (service facade, cache, single-flight,
//! degradation) over the in-memory adapters, with thin port wrappers for
//! latency and fault injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use shelfrank::adapters::{InMemoryCatalog, InMemoryHistoryStore};
use shelfrank::domain::{
    BookCatalog, CatalogItem, CatalogQuery, ItemId, RecommendationRequest, Strategy, UserId,
};
use shelfrank::error::{Error, Result};
use shelfrank::{EngineConfig, RecommendationService};

// =============================================================================
// Test Fixtures
// =============================================================================

fn book(id: u64, genre: &str, author: &str, rating: f64, count: u64) -> CatalogItem {
    CatalogItem {
        id: ItemId::new(id),
        title: format!("Book {id}"),
        author: author.to_string(),
        genre: genre.to_string(),
        rating,
        ratings_count: count,
        price: 12.0 + id as f64 % 10.0,
        published_year: 2020,
    }
}

fn seeded_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog.upsert(book(42, "sci-fi", "Le Guin", 4.6, 300));
    for i in 1..=20 {
        let genre = if i % 2 == 0 { "sci-fi" } else { "mystery" };
        catalog.upsert(book(i, genre, "Author", 4.2, i * 10));
    }
    catalog
}

fn seeded_history() -> InMemoryHistoryStore {
    let history = InMemoryHistoryStore::new();
    history.record_purchase(UserId::new(1), ItemId::new(2));
    history.record_purchase(UserId::new(2), ItemId::new(2));
    history.record_purchase(UserId::new(2), ItemId::new(4));
    history.record_purchase(UserId::new(3), ItemId::new(2));
    history.record_purchase(UserId::new(3), ItemId::new(6));
    history
}

/// Catalog wrapper injecting latency and upstream failures.
///
/// `delay_queries` applies the delay to that many leading `query` calls
/// (`u64::MAX` means every call); `fail_queries` makes that many leading
/// `query` calls return `UpstreamUnavailable` before any delay applies.
struct FlakyCatalog {
    inner: InMemoryCatalog,
    delay: Duration,
    delay_queries: AtomicU64,
    fail_queries: AtomicU64,
    query_calls: AtomicU64,
}

impl FlakyCatalog {
    fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            delay: Duration::ZERO,
            delay_queries: AtomicU64::new(0),
            fail_queries: AtomicU64::new(0),
            query_calls: AtomicU64::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration, queries: u64) -> Self {
        self.delay = delay;
        self.delay_queries = AtomicU64::new(queries);
        self
    }

    fn with_failures(self, queries: u64) -> Self {
        self.fail_queries.store(queries, Ordering::SeqCst);
        self
    }

    fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Decrement-if-positive on a countdown counter.
    fn take(counter: &AtomicU64) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BookCatalog for FlakyCatalog {
    async fn get_by_id(&self, id: ItemId) -> Result<Option<CatalogItem>> {
        self.inner.get_by_id(id).await
    }

    async fn query(&self, filter: &CatalogQuery) -> Result<Vec<CatalogItem>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.fail_queries) {
            return Err(Error::UpstreamUnavailable("catalog offline".into()));
        }
        if Self::take(&self.delay_queries) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.query(filter).await
    }
}

fn service(catalog: Arc<dyn BookCatalog>, config: EngineConfig) -> Arc<RecommendationService> {
    Arc::new(RecommendationService::new(catalog, Arc::new(seeded_history()), config).unwrap())
}

// =============================================================================
// Single-Flight
// =============================================================================

#[tokio::test]
async fn test_concurrent_misses_share_one_computation() {
    let catalog = Arc::new(
        FlakyCatalog::new(seeded_catalog()).with_delay(Duration::from_millis(300), u64::MAX),
    );
    let svc = service(catalog.clone(), EngineConfig::default());

    let request = RecommendationRequest::new(Strategy::Trending, 5);
    let a = tokio::spawn({
        let svc = Arc::clone(&svc);
        let request = request.clone();
        async move { svc.get_recommendations(request).await }
    });
    // Give the first call time to enter the flight
    tokio::time::sleep(Duration::from_millis(50)).await;
    let b = tokio::spawn({
        let svc = Arc::clone(&svc);
        let request = request.clone();
        async move { svc.get_recommendations(request).await }
    });

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    assert_eq!(first.item_ids(), second.item_ids());
    assert_eq!(catalog.query_calls(), 1);
    assert_eq!(svc.stats().computations, 1);
    assert_eq!(svc.stats().flight_waits, 1);
}

#[tokio::test]
async fn test_different_keys_do_not_coalesce() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());

    svc.get_recommendations(RecommendationRequest::new(Strategy::Trending, 5))
        .await
        .unwrap();
    svc.get_recommendations(RecommendationRequest::new(Strategy::Trending, 6))
        .await
        .unwrap();

    // Different limits are different cache keys
    assert_eq!(svc.stats().computations, 2);
    assert_eq!(svc.stats().flight_waits, 0);
}

// =============================================================================
// Caching and Invalidation
// =============================================================================

#[tokio::test]
async fn test_invalidate_for_item_forces_recompute() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let request =
        RecommendationRequest::new(Strategy::ContentBased, 5).for_item(ItemId::new(42));

    let first = svc.get_recommendations(request.clone()).await.unwrap();
    assert!(!first.cached);
    assert!(svc
        .get_recommendations(request.clone())
        .await
        .unwrap()
        .cached);

    assert_eq!(svc.invalidate_for_item(ItemId::new(42)), 1);

    let recomputed = svc.get_recommendations(request).await.unwrap();
    assert!(!recomputed.cached);
    assert_eq!(svc.stats().computations, 2);
}

#[tokio::test]
async fn test_invalidate_for_user_leaves_other_users_cached() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let user1 = RecommendationRequest::new(Strategy::Collaborative, 5).for_user(UserId::new(1));
    let user2 = RecommendationRequest::new(Strategy::Collaborative, 5).for_user(UserId::new(2));

    svc.get_recommendations(user1.clone()).await.unwrap();
    svc.get_recommendations(user2.clone()).await.unwrap();

    svc.invalidate_for_user(UserId::new(1));

    assert!(!svc.get_recommendations(user1).await.unwrap().cached);
    assert!(svc.get_recommendations(user2).await.unwrap().cached);
}

#[tokio::test]
async fn test_content_based_excludes_reference_item() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let request =
        RecommendationRequest::new(Strategy::ContentBased, 10).for_item(ItemId::new(42));

    let result = svc.get_recommendations(request).await.unwrap();
    assert_eq!(result.strategy, Strategy::ContentBased);
    assert!(!result.items.is_empty());
    assert!(!result.item_ids().contains(&ItemId::new(42)));
}

// =============================================================================
// Degradation
// =============================================================================

#[tokio::test]
async fn test_collaborative_without_history_degrades_to_trending() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let request =
        RecommendationRequest::new(Strategy::Collaborative, 5).for_user(UserId::new(404));

    let result = svc.get_recommendations(request).await.unwrap();
    assert_eq!(result.strategy, Strategy::Trending);
    assert_eq!(result.items.len(), 5);
    assert_eq!(svc.stats().degradations, 1);
    assert_eq!(svc.stats().timeouts, 0);
}

#[tokio::test]
async fn test_timeout_degrades_to_trending() {
    // First query stalls past the deadline; the trending fallback runs
    // against the then-fast catalog
    let catalog = Arc::new(
        FlakyCatalog::new(seeded_catalog()).with_delay(Duration::from_millis(500), 1),
    );
    let config = EngineConfig {
        strategy_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let svc = service(catalog, config);

    let request = RecommendationRequest::new(Strategy::Trending, 5);
    let result = svc.get_recommendations(request).await.unwrap();

    assert_eq!(result.strategy, Strategy::Trending);
    assert_eq!(result.items.len(), 5);
    assert_eq!(svc.stats().timeouts, 1);
    assert_eq!(svc.stats().degradations, 1);
}

#[tokio::test]
async fn test_upstream_failure_retries_once_then_succeeds() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog()).with_failures(1));
    let svc = service(catalog.clone(), EngineConfig::default());

    let request = RecommendationRequest::new(Strategy::Trending, 5);
    let result = svc.get_recommendations(request).await.unwrap();

    // One failed attempt, one successful retry, no degradation
    assert_eq!(result.strategy, Strategy::Trending);
    assert_eq!(catalog.query_calls(), 2);
    assert_eq!(svc.stats().degradations, 0);
}

#[tokio::test]
async fn test_upstream_failure_after_retry_degrades() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog()).with_failures(2));
    let svc = service(catalog.clone(), EngineConfig::default());

    let request = RecommendationRequest::new(Strategy::ContentBased, 5)
        .for_item(ItemId::new(42));
    let result = svc.get_recommendations(request).await.unwrap();

    // Attempt + retry both failed; the trending fallback got through
    assert_eq!(result.strategy, Strategy::Trending);
    assert_eq!(svc.stats().degradations, 1);
}

#[tokio::test]
async fn test_persistent_upstream_failure_propagates() {
    let catalog = Arc::new(FlakyCatalog::new(seeded_catalog()).with_failures(u64::MAX));
    let svc = service(catalog, EngineConfig::default());

    let request = RecommendationRequest::new(Strategy::Trending, 5);
    let err = svc.get_recommendations(request.clone()).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)));

    // Errors are never cached
    assert_eq!(svc.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_degraded_result_expires_quickly() {
    let config = EngineConfig {
        degraded_ttl: Duration::from_millis(150),
        ..Default::default()
    };
    let svc = service(Arc::new(seeded_catalog()), config);
    let request =
        RecommendationRequest::new(Strategy::Collaborative, 5).for_user(UserId::new(404));

    svc.get_recommendations(request.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The short TTL has elapsed; the real strategy is retried
    let result = svc.get_recommendations(request).await.unwrap();
    assert!(!result.cached);
    assert_eq!(svc.stats().computations, 2);
}

// =============================================================================
// Hybrid End-to-End
// =============================================================================

#[tokio::test]
async fn test_hybrid_fills_limit_with_unique_items() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let request = RecommendationRequest::new(Strategy::Hybrid, 8).for_user(UserId::new(1));

    let result = svc.get_recommendations(request).await.unwrap();
    assert_eq!(result.items.len(), 8);

    let unique: HashSet<ItemId> = result.item_ids().into_iter().collect();
    assert_eq!(unique.len(), 8);
    assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
}

#[tokio::test]
async fn test_hybrid_never_recommends_owned_items_first() {
    let svc = service(Arc::new(seeded_catalog()), EngineConfig::default());
    let request = RecommendationRequest::new(Strategy::Hybrid, 5).for_user(UserId::new(1));

    let result = svc.get_recommendations(request).await.unwrap();
    // User 1 owns item 2; collaborative and content-based slices must not
    // surface it (trending backfill legitimately may, so check the head)
    assert_ne!(result.items[0].id, ItemId::new(2));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_sweeper_lifecycle_with_traffic() {
    let config = EngineConfig {
        sweep_interval: Duration::from_millis(50),
        default_ttl: Duration::from_millis(100),
        ..Default::default()
    };
    let svc = service(Arc::new(seeded_catalog()), config);
    svc.spawn_sweeper();

    svc.get_recommendations(RecommendationRequest::new(Strategy::Trending, 5))
        .await
        .unwrap();
    assert_eq!(svc.stats().cache.entries, 1);

    // Entry expires and a sweep pass collects it without a lookup
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(svc.stats().cache.entries, 0);
    assert_eq!(svc.stats().cache.expired, 1);

    svc.shutdown().await;
}
