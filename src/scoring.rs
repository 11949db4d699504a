//! Pairwise item similarity
//!
//! Pure, deterministic scoring over catalog attributes. The batch form is
//! O(n²) on the candidate pool only; the pool is hard-capped at
//! construction and the loop honors cancellation so a timed-out request
//! aborts cheaply instead of finishing the full matrix.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::WEIGHT_SUM_EPSILON;
use crate::domain::{CatalogItem, UserProfile};
use crate::error::{Error, Result};

/// Guard against division by zero for free items.
const PRICE_EPSILON: f64 = 0.01;

/// Comparisons between cancellation checks in scoring loops.
pub const CANCEL_CHECK_EVERY: usize = 50;

/// Component weights for pairwise similarity. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub genre: f64,
    pub author: f64,
    pub price: f64,
    pub rating: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            genre: 0.4,
            author: 0.2,
            price: 0.2,
            rating: 0.2,
        }
    }
}

impl SimilarityWeights {
    /// Validate non-negativity and the unit sum. Runs at construction so
    /// bad weights are a startup error, never a per-call one.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.genre, self.author, self.price, self.rating];
        if parts.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(Error::InvalidArgument(
                "similarity weights must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(Error::InvalidArgument(format!(
                "similarity weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Deterministic pairwise similarity scorer.
#[derive(Debug)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
    pool_cap: usize,
}

impl SimilarityScorer {
    /// Fails with `InvalidArgument` when the weights do not sum to 1.0.
    pub fn new(weights: SimilarityWeights, pool_cap: usize) -> Result<Self> {
        weights.validate()?;
        if pool_cap == 0 {
            return Err(Error::InvalidArgument(
                "candidate pool cap must be >= 1".into(),
            ));
        }
        Ok(Self { weights, pool_cap })
    }

    pub fn pool_cap(&self) -> usize {
        self.pool_cap
    }

    /// Score two items in [0, 1]. Pure and O(1).
    pub fn score(&self, a: &CatalogItem, b: &CatalogItem) -> f64 {
        let genre = if a.genre == b.genre { 1.0 } else { 0.0 };
        let author = if a.author == b.author { 1.0 } else { 0.0 };
        let price = price_closeness(a.price, b.price);
        let rating = 1.0 - (a.rating - b.rating).abs() / 5.0;

        (self.weights.genre * genre
            + self.weights.author * author
            + self.weights.price * price
            + self.weights.rating * rating)
            .clamp(0.0, 1.0)
    }

    /// Affinity of an item to a user's preference centroid, in [0, 1].
    ///
    /// Genre/author components are set membership; price is closeness to
    /// the preferred range (1.0 inside, proportional falloff outside);
    /// rating is 1.0 at or above the user's minimum, linear falloff below.
    pub fn profile_score(&self, profile: &UserProfile, item: &CatalogItem) -> f64 {
        let genre = if profile.preferred_genres.contains(&item.genre) {
            1.0
        } else {
            0.0
        };
        let author = if profile.preferred_authors.contains(&item.author) {
            1.0
        } else {
            0.0
        };

        let (low, high) = profile.price_range;
        let price = if item.price >= low && item.price <= high {
            1.0
        } else {
            let nearest = if item.price < low { low } else { high };
            price_closeness(item.price, nearest)
        };

        let rating = if item.rating >= profile.min_rating {
            1.0
        } else {
            1.0 - (profile.min_rating - item.rating) / 5.0
        };

        (self.weights.genre * genre
            + self.weights.author * author
            + self.weights.price * price
            + self.weights.rating * rating)
            .clamp(0.0, 1.0)
    }

    /// Symmetric similarity matrix over at most `pool_cap` items.
    ///
    /// Checks `cancel` every 50 comparisons; a fired token aborts the pass
    /// with `Timeout` rather than completing the O(n²) loop.
    pub fn batch_similarity(
        &self,
        items: &[CatalogItem],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f64>>> {
        let n = items.len().min(self.pool_cap);
        let mut matrix = vec![vec![0.0; n]; n];
        let mut comparisons = 0usize;

        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                if comparisons % CANCEL_CHECK_EVERY == 0 && cancel.is_cancelled() {
                    return Err(Error::Timeout(
                        "similarity batch cancelled mid-pass".into(),
                    ));
                }
                let score = self.score(&items[i], &items[j]);
                matrix[i][j] = score;
                matrix[j][i] = score;
                comparisons += 1;
            }
        }

        Ok(matrix)
    }
}

fn price_closeness(a: f64, b: f64) -> f64 {
    1.0 - (a - b).abs() / a.max(b).max(PRICE_EPSILON)
}

// =============================================================================
// Tests
// =============================================================================
