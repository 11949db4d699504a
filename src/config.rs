//! Engine configuration
//!
//! All tunables recognized by the engine, validated once at startup so that
//! invalid weights or TTLs fail construction instead of surfacing mid-request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scoring::SimilarityWeights;

/// Tolerance for weight sums (weights are human-edited configuration).
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// How the hybrid strategy splits its limit across sub-strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content_based: f64,
    pub trending: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.5,
            content_based: 0.3,
            trending: 0.2,
        }
    }
}

impl HybridWeights {
    /// Validate that the weights are non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.collaborative, self.content_based, self.trending];
        if parts.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(Error::InvalidArgument(
                "hybrid weights must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(Error::InvalidArgument(format!(
                "hybrid weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Engine configuration.
///
/// Defaults match the documented contract: 2000-entry cache, 1800s TTL for
/// catalog-driven strategies, 300s for personalized ones, 2s strategy
/// deadline, 500-item candidate pool.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum cached entries; 0 disables caching entirely
    pub cache_capacity: usize,
    /// TTL for trending / content-based results
    pub default_ttl: Duration,
    /// TTL for collaborative / hybrid results
    pub personalized_ttl: Duration,
    /// TTL for degraded (timed-out or empty) results, kept short so the
    /// next request retries the real strategy soon
    pub degraded_ttl: Duration,
    /// Deadline for one strategy computation
    pub strategy_timeout: Duration,
    /// Hard cap on the candidate pool consumed by any strategy
    pub candidate_pool_cap: usize,
    /// Minimum rating for an item to count as trending
    pub rating_threshold: f64,
    /// Hybrid limit allocation
    pub hybrid_weights: HybridWeights,
    /// Pairwise similarity component weights
    pub similarity_weights: SimilarityWeights,
    /// Background sweep cadence
    pub sweep_interval: Duration,
    /// Maximum cache entries examined per sweep pass
    pub sweep_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 2000,
            default_ttl: Duration::from_secs(1800),
            personalized_ttl: Duration::from_secs(300),
            degraded_ttl: Duration::from_secs(60),
            strategy_timeout: Duration::from_millis(2000),
            candidate_pool_cap: 500,
            rating_threshold: 4.0,
            hybrid_weights: HybridWeights::default(),
            similarity_weights: SimilarityWeights::default(),
            sweep_interval: Duration::from_secs(60),
            sweep_batch: 256,
        }
    }
}

impl EngineConfig {
    /// Validate the whole configuration. Called by the service constructor;
    /// errors here are startup errors, never per-request ones.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_zero()
            || self.personalized_ttl.is_zero()
            || self.degraded_ttl.is_zero()
        {
            return Err(Error::Config("TTLs must be positive".into()));
        }
        if self.strategy_timeout.is_zero() {
            return Err(Error::Config("strategy timeout must be positive".into()));
        }
        if self.candidate_pool_cap == 0 {
            return Err(Error::Config("candidate pool cap must be >= 1".into()));
        }
        if !(0.0..=5.0).contains(&self.rating_threshold) {
            return Err(Error::Config(format!(
                "rating threshold must be in [0, 5], got {}",
                self.rating_threshold
            )));
        }
        if self.sweep_batch == 0 {
            return Err(Error::Config("sweep batch must be >= 1".into()));
        }
        self.hybrid_weights
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        self.similarity_weights
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }

    /// TTL to apply to a fresh result for the given strategy.
    pub fn ttl_for(&self, strategy: crate::domain::Strategy) -> Duration {
        if strategy.is_personalized() {
            self.personalized_ttl
        } else {
            self.default_ttl
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
