//! Domain model for the recommendation engine
//!
//! Value objects and snapshot types shared across the cache, the strategy
//! engine, and the service facade. Catalog attributes are refreshed by the
//! external catalog collaborator; this engine never mutates them.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// Value Objects
// =============================================================================

/// Catalog item identifier (value object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// User identifier (value object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self(0)
    }
}

// =============================================================================
// Catalog Snapshot Types
// =============================================================================

/// A book in the catalog.
///
/// Identity (`id`) is immutable; the remaining attributes are a snapshot
/// taken when the catalog collaborator was last queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub author: String,
    pub genre: String,
    /// Average rating in [0, 5]
    pub rating: f64,
    pub ratings_count: u64,
    pub price: f64,
    pub published_year: i32,
}

/// Read-only per-request snapshot of a user's preferences and history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub preferred_genres: HashSet<String>,
    pub preferred_authors: HashSet<String>,
    pub purchase_history: HashSet<ItemId>,
    pub min_rating: f64,
    /// Inclusive (low, high) price bounds
    pub price_range: (f64, f64),
}

// =============================================================================
// Strategy
// =============================================================================

/// The four top-level recommendation strategies.
///
/// A closed enum: callers select a variant explicitly and dispatch is an
/// exhaustive match, never string branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Trending,
    ContentBased,
    Collaborative,
    Hybrid,
}

impl Strategy {
    /// All variants, in hybrid merge order (most personalized first).
    pub const ALL: [Strategy; 4] = [
        Strategy::Collaborative,
        Strategy::ContentBased,
        Strategy::Trending,
        Strategy::Hybrid,
    ];

    /// True for strategies whose output depends on a user's history and
    /// therefore goes stale faster than catalog popularity.
    pub fn is_personalized(&self) -> bool {
        matches!(self, Strategy::Collaborative | Strategy::Hybrid)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Trending => write!(f, "trending"),
            Strategy::ContentBased => write!(f, "content_based"),
            Strategy::Collaborative => write!(f, "collaborative"),
            Strategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trending" => Ok(Strategy::Trending),
            "content_based" => Ok(Strategy::ContentBased),
            "collaborative" => Ok(Strategy::Collaborative),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(Error::InvalidArgument(format!(
                "unknown strategy tag: {other}"
            ))),
        }
    }
}

// =============================================================================
// Request / Result
// =============================================================================

/// A recommendation request as handed over by the host process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub strategy: Strategy,
    pub user_id: Option<UserId>,
    pub item_id: Option<ItemId>,
    pub limit: usize,
}

impl RecommendationRequest {
    pub fn new(strategy: Strategy, limit: usize) -> Self {
        Self {
            strategy,
            user_id: None,
            item_id: None,
            limit,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn for_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }
}

/// An ordered recommendation list with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// Ordered best-first
    pub items: Vec<CatalogItem>,
    /// Strategy that actually produced the items (may differ from the
    /// requested one after degradation)
    pub strategy: Strategy,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
    /// True when served from the cache rather than computed
    pub cached: bool,
}

impl RecommendationResult {
    pub fn new(items: Vec<CatalogItem>, strategy: Strategy, confidence: f64) -> Self {
        Self {
            items,
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            generated_at: Utc::now(),
            cached: false,
        }
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_strategy_round_trip() {
        for s in Strategy::ALL {
            assert_eq!(s.to_string().parse::<Strategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_unknown_strategy_is_invalid_argument() {
        let err = "most_popular".parse::<Strategy>().unwrap_err();
        assert_matches!(err, Error::InvalidArgument(_));
    }

    #[test]
    fn test_personalized_classification() {
        assert!(Strategy::Collaborative.is_personalized());
        assert!(Strategy::Hybrid.is_personalized());
        assert!(!Strategy::Trending.is_personalized());
        assert!(!Strategy::ContentBased.is_personalized());
    }

    #[test]
    fn test_request_builder() {
        let req = RecommendationRequest::new(Strategy::ContentBased, 10)
            .for_user(UserId::new(7))
            .for_item(ItemId::new(42));

        assert_eq!(req.limit, 10);
        assert_eq!(req.user_id, Some(UserId(7)));
        assert_eq!(req.item_id, Some(ItemId(42)));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let result = RecommendationResult::new(vec![], Strategy::Trending, 1.7);
        assert_eq!(result.confidence, 1.0);

        let result = RecommendationResult::new(vec![], Strategy::Trending, -0.2);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_strategy_serde_tag() {
        let json = serde_json::to_string(&Strategy::ContentBased).unwrap();
        assert_eq!(json, "\"content_based\"");
    }
}
