//! Trending strategy
//!
//! Popularity over personalization: candidates rated at or above the
//! configured threshold, ranked by ratings volume.

use crate::domain::CatalogQuery;
use crate::error::Result;
use crate::rank::top_k;

use super::{StrategyEngine, StrategyOutcome};

/// Base confidence for a fully-filled trending list; popularity is a weak
/// signal compared to personalized strategies.
const BASE_CONFIDENCE: f64 = 0.6;

pub(super) async fn run(engine: &StrategyEngine, limit: usize) -> Result<StrategyOutcome> {
    // Hybrid quotas can legitimately allocate zero slots to trending
    if limit == 0 {
        return Ok(StrategyOutcome::empty());
    }

    let filter = CatalogQuery::with_pool_cap(engine.pool_cap).min_rating(engine.rating_threshold);
    let pool = engine.catalog.query(&filter).await?;

    let items = top_k(&pool, limit, |item| item.ratings_count as f64);

    let fill = (items.len() as f64 / limit as f64).min(1.0);
    Ok(StrategyOutcome {
        items,
        confidence: BASE_CONFIDENCE * fill,
    })
}

// =============================================================================
// Tests
// =============================================================================
