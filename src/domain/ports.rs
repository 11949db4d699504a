//! Collaborator Ports (Port/Adapter Pattern)
//!
//! Read-only abstractions over the catalog and user-history collaborators.
//! The engine consumes these as immutable snapshots for the lifetime of one
//! computation; mutation flows (catalog updates, purchases) live outside and
//! notify the engine only through `invalidate_for_item` / `invalidate_for_user`.

use std::collections::HashSet;

use async_trait::async_trait;

use super::model::{CatalogItem, ItemId, UserId, UserProfile};
use crate::error::Result;

// =============================================================================
// Catalog Port
// =============================================================================

/// Filter for catalog queries.
///
/// `max_results` doubles as the candidate-pool bound: adapters must never
/// return more items than requested, so strategy cost stays bounded no
/// matter how large the catalog grows.
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Keep only items rated at or above this value
    pub min_rating: Option<f64>,
    /// Keep only items in any of these genres
    pub genres: Option<HashSet<String>>,
    /// Hard cap on returned items (candidate pool bound)
    pub max_results: usize,
}

impl CatalogQuery {
    pub fn with_pool_cap(max_results: usize) -> Self {
        Self {
            max_results,
            ..Default::default()
        }
    }

    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn genres(mut self, genres: HashSet<String>) -> Self {
        self.genres = Some(genres);
        self
    }
}

/// Port for the external book catalog.
///
/// Adapters must return candidates in deterministic order (ascending id)
/// so that identical inputs reproduce identical rankings.
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Look up a single item.
    async fn get_by_id(&self, id: ItemId) -> Result<Option<CatalogItem>>;

    /// Query items matching the filter, capped at `filter.max_results`.
    async fn query(&self, filter: &CatalogQuery) -> Result<Vec<CatalogItem>>;
}

// =============================================================================
// User History Port
// =============================================================================

/// Port for the external purchase-history and wishlist store.
#[async_trait]
pub trait UserHistoryStore: Send + Sync {
    /// Preference snapshot for a user, if one exists.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;

    /// Set of item ids the user has purchased. Unknown users yield an
    /// empty set, not an error.
    async fn get_purchase_history(&self, user_id: UserId) -> Result<HashSet<ItemId>>;

    /// Set of item ids on the user's wishlist.
    async fn get_wishlist(&self, user_id: UserId) -> Result<HashSet<ItemId>>;

    /// Users who purchased at least one of the given items, excluding
    /// `exclude` (the requesting user). Deterministic ascending order.
    async fn co_purchasers(
        &self,
        items: &HashSet<ItemId>,
        exclude: UserId,
    ) -> Result<Vec<UserId>>;
}
