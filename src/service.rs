//! Recommendation Service
//!
//! The only component exposed to the outer system. Orchestrates cache
//! lookup, per-key single-flight computation, the strategy timeout with
//! trending degradation, upstream retry, and explicit invalidation.
//!
//! Constructed explicitly with injected collaborators; no ambient global
//! state. `spawn_sweeper` starts background expiry collection and
//! `shutdown` stops it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{spawn_sweeper, CacheStats, CacheStore};
use crate::config::EngineConfig;
use crate::domain::{
    BookCatalog, ItemId, RecommendationRequest, RecommendationResult, Strategy, UserHistoryStore,
    UserId,
};
use crate::error::{Error, Result};
use crate::strategy::{StrategyEngine, StrategyOutcome};

/// Fixed backoff before the single upstream retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Service counters snapshot.
#[derive(Debug, Clone)]
pub struct ServiceStats {
    pub computations: u64,
    pub cache_hits: u64,
    pub timeouts: u64,
    pub degradations: u64,
    pub flight_waits: u64,
    pub cache: CacheStats,
}

#[derive(Default)]
struct ServiceMetrics {
    computations: AtomicU64,
    cache_hits: AtomicU64,
    timeouts: AtomicU64,
    degradations: AtomicU64,
    flight_waits: AtomicU64,
}

/// The recommendation engine facade.
pub struct RecommendationService {
    engine: StrategyEngine,
    cache: Arc<CacheStore<RecommendationResult>>,
    flights: DashMap<String, Arc<OnceCell<RecommendationResult>>>,
    config: EngineConfig,
    metrics: ServiceMetrics,
    shutdown_token: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RecommendationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationService")
            .finish_non_exhaustive()
    }
}

impl RecommendationService {
    /// Build the service. Configuration is validated here so invalid
    /// weights or TTLs fail startup, not the first request.
    pub fn new(
        catalog: Arc<dyn BookCatalog>,
        history: Arc<dyn UserHistoryStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let engine = StrategyEngine::new(catalog, history, &config)?;
        Ok(Self {
            engine,
            cache: Arc::new(CacheStore::new(config.cache_capacity)),
            flights: DashMap::new(),
            config,
            metrics: ServiceMetrics::default(),
            shutdown_token: CancellationToken::new(),
            sweeper: Mutex::new(None),
        })
    }

    /// Start the background TTL sweeper. Idempotent per service instance;
    /// must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }
        *guard = Some(spawn_sweeper(
            Arc::clone(&self.cache),
            self.config.sweep_interval,
            self.config.sweep_batch,
            self.shutdown_token.child_token(),
        ));
    }

    /// Stop background work and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("recommendation service shut down");
    }

    /// Serve a recommendation request.
    ///
    /// Cache hit returns immediately with `cached = true`. On a miss, at
    /// most one computation per cache key runs; concurrent callers for
    /// the same key await that computation's result.
    pub async fn get_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResult> {
        if request.limit == 0 {
            return Err(Error::InvalidArgument("limit must be >= 1".into()));
        }

        let key = cache_key(&request);

        if let Some(mut result) = self.cache.get(&key) {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            result.cached = true;
            debug!(%key, "cache hit");
            return Ok(result);
        }

        // Single-flight: first caller in creates the cell and computes,
        // the rest await it.
        let cell = match self.flights.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.metrics.flight_waits.fetch_add(1, Ordering::Relaxed);
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(OnceCell::new())).clone(),
        };

        let result = cell
            .get_or_try_init(|| self.compute_and_cache(&key, &request))
            .await
            .cloned();

        // Drop the guard once the flight has landed so later misses
        // recompute instead of reading a stale cell.
        self.flights
            .remove_if(&key, |_, value| Arc::ptr_eq(value, &cell));

        result
    }

    /// Remove every cached result whose key references the item.
    /// Called by the catalog collaborator on item mutation.
    pub fn invalidate_for_item(&self, item_id: ItemId) -> usize {
        let token = format!(":i{item_id}:");
        let removed = self.cache.invalidate_matching(|key| key.contains(&token));
        debug!(%item_id, removed, "invalidated cache entries for item");
        removed
    }

    /// Remove every cached result whose key references the user.
    /// Called by the history collaborator on purchase/profile mutation.
    pub fn invalidate_for_user(&self, user_id: UserId) -> usize {
        let token = format!(":u{user_id}:");
        let removed = self.cache.invalidate_matching(|key| key.contains(&token));
        debug!(%user_id, removed, "invalidated cache entries for user");
        removed
    }

    /// Counters snapshot for the metrics endpoint.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            computations: self.metrics.computations.load(Ordering::Relaxed),
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            timeouts: self.metrics.timeouts.load(Ordering::Relaxed),
            degradations: self.metrics.degradations.load(Ordering::Relaxed),
            flight_waits: self.metrics.flight_waits.load(Ordering::Relaxed),
            cache: self.cache.stats(),
        }
    }

    // =========================================================================
    // Computation path
    // =========================================================================

    async fn compute_and_cache(
        &self,
        key: &str,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResult> {
        self.metrics.computations.fetch_add(1, Ordering::Relaxed);

        let (outcome, strategy, degraded) = match self.run_with_retry(request).await {
            Ok(outcome) if !outcome.is_empty() => (outcome, request.strategy, false),
            Ok(_) => {
                // No data for the requested strategy; popularity still works
                debug!(strategy = %request.strategy, "empty result, degrading to trending");
                (self.trending_fallback(request).await?, Strategy::Trending, true)
            }
            Err(Error::NotFound { kind, id }) => {
                // A referenced entity vanishing between calls is missing
                // data, not a caller error
                debug!(kind, %id, "referenced entity missing, degrading to trending");
                (self.trending_fallback(request).await?, Strategy::Trending, true)
            }
            Err(Error::Timeout(reason)) => {
                self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(strategy = %request.strategy, %reason, "strategy timed out, degrading to trending");
                (self.trending_fallback(request).await?, Strategy::Trending, true)
            }
            Err(err) if err.is_retryable() => {
                warn!(strategy = %request.strategy, error = %err, "upstream unavailable after retry, degrading to trending");
                match self.trending_fallback(request).await {
                    Ok(outcome) => (outcome, Strategy::Trending, true),
                    // Trending is equally unreachable: surface the failure
                    Err(_) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        if degraded {
            self.metrics.degradations.fetch_add(1, Ordering::Relaxed);
        }

        let result = RecommendationResult::new(outcome.items, strategy, outcome.confidence);

        // Degraded entries get a short TTL so the next request retries
        // the real strategy soon
        let ttl = if degraded {
            self.config.degraded_ttl
        } else {
            self.config.ttl_for(request.strategy)
        };
        self.cache.set(key.to_string(), result.clone(), ttl)?;

        Ok(result)
    }

    /// One strategy pass under the configured deadline, retried once with
    /// fixed backoff when the upstream is unavailable.
    async fn run_with_retry(&self, request: &RecommendationRequest) -> Result<StrategyOutcome> {
        match self.run_once(request).await {
            Err(err) if err.is_retryable() => {
                debug!(error = %err, "upstream failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.run_once(request).await
            }
            other => other,
        }
    }

    async fn run_once(&self, request: &RecommendationRequest) -> Result<StrategyOutcome> {
        let deadline = self.config.strategy_timeout;
        let cancel = CancellationToken::new();

        // Watchdog fires the token at the deadline so synchronous scoring
        // loops abort at their next cancellation check even between await
        // points.
        let watchdog = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = tokio::time::timeout(deadline, self.engine.execute(request, &cancel)).await;
        watchdog.abort();

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(format!(
                "{} exceeded {}ms",
                request.strategy,
                deadline.as_millis()
            ))),
        }
    }

    /// Trending pass used for degradation; runs under its own deadline.
    async fn trending_fallback(&self, request: &RecommendationRequest) -> Result<StrategyOutcome> {
        let fallback = RecommendationRequest {
            strategy: Strategy::Trending,
            ..request.clone()
        };
        self.run_once(&fallback).await
    }
}

/// Deterministic cache key: strategy plus every input that affects the
/// result. Absent ids render as `-` so tokens stay unambiguous.
fn cache_key(request: &RecommendationRequest) -> String {
    let user = request
        .user_id
        .map(|u| u.to_string())
        .unwrap_or_else(|| "-".to_string());
    let item = request
        .item_id
        .map(|i| i.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "rec:{}:u{}:i{}:l{}",
        request.strategy, user, item, request.limit
    )
}

// =============================================================================
// Tests
// =============================================================================
