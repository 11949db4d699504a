//! Content-based strategy
//!
//! Scores every candidate against a reference item, or against the user's
//! preference centroid when no reference is given. Items the user already
//! owns are never recommended back.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;

use crate::domain::{CatalogQuery, ItemId, RecommendationRequest};
use crate::error::{Error, Result};
use crate::rank::top_k;
use crate::scoring::CANCEL_CHECK_EVERY;

use super::{StrategyEngine, StrategyOutcome};

pub(super) async fn run(
    engine: &StrategyEngine,
    request: &RecommendationRequest,
    cancel: &CancellationToken,
) -> Result<StrategyOutcome> {
    let reference = match request.item_id {
        Some(id) => engine.catalog.get_by_id(id).await?,
        None => None,
    };

    let profile = match (reference.is_some(), request.user_id) {
        // Reference item wins; profile only consulted for exclusions
        (_, Some(user_id)) => engine.history.get_profile(user_id).await?,
        _ => None,
    };

    // Missing both anchors is missing data, not an error: the service
    // falls back to trending on an empty outcome.
    if reference.is_none() && profile.is_none() {
        return Ok(StrategyOutcome::empty());
    }

    let filter = CatalogQuery::with_pool_cap(engine.pool_cap);
    let pool = engine.catalog.query(&filter).await?;

    let owned: HashSet<ItemId> = profile
        .as_ref()
        .map(|p| p.purchase_history.clone())
        .unwrap_or_default();

    let mut scores: HashMap<u64, f64> = HashMap::with_capacity(pool.len());
    let mut candidates = Vec::with_capacity(pool.len());
    for (i, candidate) in pool.iter().enumerate() {
        if i % CANCEL_CHECK_EVERY == 0 && cancel.is_cancelled() {
            return Err(Error::Timeout("content-based scoring cancelled".into()));
        }
        if Some(candidate.id) == request.item_id || owned.contains(&candidate.id) {
            continue;
        }
        let score = match (&reference, &profile) {
            (Some(anchor), _) => engine.scorer.score(anchor, candidate),
            (None, Some(p)) => engine.scorer.profile_score(p, candidate),
            (None, None) => unreachable!("anchor presence checked above"),
        };
        scores.insert(candidate.id.0, score);
        candidates.push(candidate.clone());
    }

    let items = top_k(&candidates, request.limit, |item| scores[&item.id.0]);

    // Confidence is the mean similarity of what was actually selected
    let confidence = if items.is_empty() {
        0.0
    } else {
        items.iter().map(|i| scores[&i.id.0]).sum::<f64>() / items.len() as f64
    };

    Ok(StrategyOutcome { items, confidence })
}

// =============================================================================
// Tests
// =============================================================================
