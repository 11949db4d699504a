//! Collaborative strategy
//!
//! Co-occurrence filtering: neighbors are users sharing at least one
//! purchased item; their other purchases are ranked by how many neighbors
//! own them. The per-item mean rating across neighbors is the item's
//! catalog rating, so the (neighbor count, rating, id) ordering falls out
//! of the ranker's standard tie-break.

use std::collections::HashMap;

use crate::domain::{ItemId, RecommendationRequest};
use crate::error::Result;
use crate::rank::top_k;

use super::{StrategyEngine, StrategyOutcome};

/// Neighbor count at which confidence saturates.
const CONFIDENCE_SATURATION: f64 = 10.0;

pub(super) async fn run(
    engine: &StrategyEngine,
    request: &RecommendationRequest,
) -> Result<StrategyOutcome> {
    let Some(user_id) = request.user_id else {
        return Ok(StrategyOutcome::empty());
    };

    let own_history = engine.history.get_purchase_history(user_id).await?;
    if own_history.is_empty() {
        // Missing data, not an error: the service substitutes trending
        return Ok(StrategyOutcome::empty());
    }

    let mut neighbors = engine.history.co_purchasers(&own_history, user_id).await?;
    // Neighbor fan-out is bounded the same way the candidate pool is
    neighbors.truncate(engine.pool_cap);
    if neighbors.is_empty() {
        return Ok(StrategyOutcome::empty());
    }

    // Aggregate neighbor-item co-occurrence over items the user lacks
    let mut counts: HashMap<ItemId, u64> = HashMap::new();
    for neighbor in &neighbors {
        let their_history = engine.history.get_purchase_history(*neighbor).await?;
        for item_id in their_history {
            if !own_history.contains(&item_id) {
                *counts.entry(item_id).or_insert(0) += 1;
            }
        }
    }

    // Deterministic fetch order, bounded by the pool cap
    let mut candidate_ids: Vec<ItemId> = counts.keys().copied().collect();
    candidate_ids.sort_unstable();
    candidate_ids.truncate(engine.pool_cap);

    let mut candidates = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        // Items missing from the catalog snapshot are skipped, not errors
        if let Some(item) = engine.catalog.get_by_id(id).await? {
            candidates.push(item);
        }
    }

    let items = top_k(&candidates, request.limit, |item| {
        counts[&item.id] as f64
    });

    let confidence = (neighbors.len() as f64 / CONFIDENCE_SATURATION).min(1.0);
    Ok(StrategyOutcome { items, confidence })
}

// =============================================================================
// Tests
// =============================================================================
