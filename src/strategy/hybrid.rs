//! Hybrid strategy
//!
//! Splits the limit across collaborative, content-based, and trending by
//! configured weight, runs the sub-strategies concurrently, merges with
//! first-seen-wins dedup, and backfills any shortfall from trending.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::domain::{CatalogItem, ItemId, RecommendationRequest, Strategy};
use crate::error::Result;

use super::{collaborative, content_based, trending, StrategyEngine, StrategyOutcome};

pub(super) async fn run(
    engine: &StrategyEngine,
    request: &RecommendationRequest,
    cancel: &CancellationToken,
) -> Result<StrategyOutcome> {
    let limit = request.limit;
    let weights = engine.hybrid_weights;

    let mut quota_collab = (limit as f64 * weights.collaborative).floor() as usize;
    let mut quota_content = (limit as f64 * weights.content_based).floor() as usize;
    let mut quota_trend = (limit as f64 * weights.trending).floor() as usize;

    // Rounding remainder goes to the heaviest-weighted strategy
    let remainder = limit - (quota_collab + quota_content + quota_trend);
    if weights.collaborative >= weights.content_based && weights.collaborative >= weights.trending {
        quota_collab += remainder;
    } else if weights.content_based >= weights.trending {
        quota_content += remainder;
    } else {
        quota_trend += remainder;
    }

    let collab_request = RecommendationRequest {
        strategy: Strategy::Collaborative,
        limit: quota_collab,
        ..request.clone()
    };
    let content_request = RecommendationRequest {
        strategy: Strategy::ContentBased,
        limit: quota_content,
        ..request.clone()
    };

    let (collab, content, trend) = futures::join!(
        collaborative::run(engine, &collab_request),
        content_based::run(engine, &content_request, cancel),
        trending::run(engine, quota_trend),
    );
    let collab = collab?;
    let content = content?;
    let trend = trend?;

    // Merge most-personalized-first; first occurrence of an id wins
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(limit);
    let mut merged: Vec<CatalogItem> = Vec::with_capacity(limit);
    for item in collab
        .items
        .iter()
        .chain(content.items.iter())
        .chain(trend.items.iter())
    {
        if merged.len() == limit {
            break;
        }
        if seen.insert(item.id) {
            merged.push(item.clone());
        }
    }

    // Backfill shortfall from trending over the full limit
    if merged.len() < limit {
        let backfill = trending::run(engine, limit).await?;
        for item in backfill.items {
            if merged.len() == limit {
                break;
            }
            if seen.insert(item.id) {
                merged.push(item);
            }
        }
    }

    // Weighted mean confidence over the strategies that contributed
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (outcome, weight) in [
        (&collab, weights.collaborative),
        (&content, weights.content_based),
        (&trend, weights.trending),
    ] {
        if !outcome.is_empty() {
            weighted += outcome.confidence * weight;
            weight_sum += weight;
        }
    }
    let confidence = if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        0.0
    };

    Ok(StrategyOutcome {
        items: merged,
        confidence,
    })
}

// =============================================================================
// Tests
// =============================================================================
