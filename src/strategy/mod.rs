//! Strategy Engine
//!
//! One module per recommendation strategy, dispatched through an exhaustive
//! match on the closed [`Strategy`] enum. Each call is stateless given its
//! inputs: the catalog/history snapshots read through the ports are treated
//! as immutable for the lifetime of one computation.
//!
//! Failure policy: missing data (no purchase history, no reference item)
//! yields an empty outcome, never an error. The service layer interprets
//! empty as "fall back to trending". Only structurally invalid input is
//! rejected.

mod collaborative;
mod content_based;
mod hybrid;
mod trending;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{EngineConfig, HybridWeights};
use crate::domain::{BookCatalog, CatalogItem, RecommendationRequest, Strategy, UserHistoryStore};
use crate::error::{Error, Result};
use crate::scoring::SimilarityScorer;

/// What one strategy pass produced.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    /// Ordered best-first
    pub items: Vec<CatalogItem>,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl StrategyOutcome {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Executes the four recommendation strategies over bounded candidate pools.
pub struct StrategyEngine {
    pub(crate) catalog: Arc<dyn BookCatalog>,
    pub(crate) history: Arc<dyn UserHistoryStore>,
    pub(crate) scorer: SimilarityScorer,
    pub(crate) rating_threshold: f64,
    pub(crate) pool_cap: usize,
    pub(crate) hybrid_weights: HybridWeights,
}

impl StrategyEngine {
    /// Build the engine. Weight validation happens here, so invalid
    /// configuration fails at startup rather than on the first request.
    pub fn new(
        catalog: Arc<dyn BookCatalog>,
        history: Arc<dyn UserHistoryStore>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.hybrid_weights.validate()?;
        let scorer = SimilarityScorer::new(config.similarity_weights, config.candidate_pool_cap)?;
        Ok(Self {
            catalog,
            history,
            scorer,
            rating_threshold: config.rating_threshold,
            pool_cap: config.candidate_pool_cap,
            hybrid_weights: config.hybrid_weights,
        })
    }

    /// Run the requested strategy.
    ///
    /// `cancel` is the request's timeout context; scoring loops check it
    /// periodically so a timed-out request aborts instead of finishing a
    /// full pass over the pool.
    pub async fn execute(
        &self,
        request: &RecommendationRequest,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome> {
        if request.limit == 0 {
            return Err(Error::InvalidArgument("limit must be >= 1".into()));
        }

        let outcome = match request.strategy {
            Strategy::Trending => trending::run(self, request.limit).await?,
            Strategy::ContentBased => content_based::run(self, request, cancel).await?,
            Strategy::Collaborative => collaborative::run(self, request).await?,
            Strategy::Hybrid => hybrid::run(self, request, cancel).await?,
        };

        debug!(
            strategy = %request.strategy,
            produced = outcome.items.len(),
            confidence = outcome.confidence,
            "strategy pass complete"
        );
        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use crate::adapters::{InMemoryCatalog, InMemoryHistoryStore};
    use crate::domain::{CatalogItem, ItemId, UserId, UserProfile};

    pub fn book(id: u64, genre: &str, author: &str, rating: f64, count: u64) -> CatalogItem {
        CatalogItem {
            id: ItemId::new(id),
            title: format!("Book {id}"),
            author: author.to_string(),
            genre: genre.to_string(),
            rating,
            ratings_count: count,
            price: 12.0,
            published_year: 2021,
        }
    }

    pub fn profile(user: u64, genres: &[&str], purchased: &[u64]) -> UserProfile {
        UserProfile {
            user_id: UserId::new(user),
            preferred_genres: genres.iter().map(|g| g.to_string()).collect(),
            preferred_authors: HashSet::new(),
            purchase_history: purchased.iter().map(|i| ItemId::new(*i)).collect(),
            min_rating: 3.0,
            price_range: (5.0, 30.0),
        }
    }

    pub fn seeded_catalog(items: Vec<CatalogItem>) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    pub fn seeded_history(profiles: Vec<UserProfile>) -> InMemoryHistoryStore {
        let store = InMemoryHistoryStore::new();
        for profile in profiles {
            store.upsert_profile(profile);
        }
        store
    }
}
