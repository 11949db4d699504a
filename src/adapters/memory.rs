//! In-memory collaborator adapters
//!
//! Back the catalog and history ports with ordered maps so query results
//! come out in ascending-id order, keeping strategy output deterministic.
//! Used by the demo binary and the test suites; production deployments
//! implement the same ports over the real catalog and history services.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{
    BookCatalog, CatalogItem, CatalogQuery, ItemId, UserHistoryStore, UserId, UserProfile,
};
use crate::error::Result;

// =============================================================================
// Catalog
// =============================================================================

/// In-memory [`BookCatalog`] adapter.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<BTreeMap<ItemId, CatalogItem>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item.
    pub fn upsert(&self, item: CatalogItem) {
        self.items.write().insert(item.id, item);
    }

    pub fn remove(&self, id: ItemId) -> bool {
        self.items.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl BookCatalog for InMemoryCatalog {
    async fn get_by_id(&self, id: ItemId) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().get(&id).cloned())
    }

    async fn query(&self, filter: &CatalogQuery) -> Result<Vec<CatalogItem>> {
        let cap = if filter.max_results == 0 {
            usize::MAX
        } else {
            filter.max_results
        };
        let items = self.items.read();
        Ok(items
            .values()
            .filter(|item| {
                filter
                    .min_rating
                    .map_or(true, |min| item.rating >= min)
            })
            .filter(|item| {
                filter
                    .genres
                    .as_ref()
                    .map_or(true, |genres| genres.contains(&item.genre))
            })
            .take(cap)
            .cloned()
            .collect())
    }
}

// =============================================================================
// User History
// =============================================================================

/// In-memory [`UserHistoryStore`] adapter.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    profiles: RwLock<BTreeMap<UserId, UserProfile>>,
    wishlists: RwLock<BTreeMap<UserId, HashSet<ItemId>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub fn upsert_profile(&self, profile: UserProfile) {
        self.profiles.write().insert(profile.user_id, profile);
    }

    /// Record a purchase for a user, creating the profile if needed.
    pub fn record_purchase(&self, user_id: UserId, item_id: ItemId) {
        let mut profiles = self.profiles.write();
        profiles
            .entry(user_id)
            .or_insert_with(|| UserProfile {
                user_id,
                ..Default::default()
            })
            .purchase_history
            .insert(item_id);
    }

    pub fn set_wishlist(&self, user_id: UserId, items: HashSet<ItemId>) {
        self.wishlists.write().insert(user_id, items);
    }
}

#[async_trait]
impl UserHistoryStore for InMemoryHistoryStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(&user_id).cloned())
    }

    async fn get_purchase_history(&self, user_id: UserId) -> Result<HashSet<ItemId>> {
        Ok(self
            .profiles
            .read()
            .get(&user_id)
            .map(|p| p.purchase_history.clone())
            .unwrap_or_default())
    }

    async fn get_wishlist(&self, user_id: UserId) -> Result<HashSet<ItemId>> {
        Ok(self
            .wishlists
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn co_purchasers(
        &self,
        items: &HashSet<ItemId>,
        exclude: UserId,
    ) -> Result<Vec<UserId>> {
        Ok(self
            .profiles
            .read()
            .values()
            .filter(|p| p.user_id != exclude)
            .filter(|p| !p.purchase_history.is_disjoint(items))
            .map(|p| p.user_id)
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: u64, genre: &str, rating: f64) -> CatalogItem {
        CatalogItem {
            id: ItemId::new(id),
            title: format!("Book {id}"),
            author: "Author".to_string(),
            genre: genre.to_string(),
            rating,
            ratings_count: 10,
            price: 15.0,
            published_year: 2019,
        }
    }

    #[tokio::test]
    async fn test_catalog_query_ascending_order() {
        let catalog = InMemoryCatalog::new();
        for id in [5, 1, 9, 3] {
            catalog.upsert(book(id, "sci-fi", 4.0));
        }
        let results = catalog
            .query(&CatalogQuery::with_pool_cap(10))
            .await
            .unwrap();
        let ids: Vec<u64> = results.iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![1, 3, 5, 9]);
    }

    #[tokio::test]
    async fn test_catalog_query_filters_and_cap() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(book(1, "sci-fi", 4.5));
        catalog.upsert(book(2, "sci-fi", 3.0));
        catalog.upsert(book(3, "romance", 4.5));
        catalog.upsert(book(4, "sci-fi", 4.9));

        let filter = CatalogQuery::with_pool_cap(1)
            .min_rating(4.0)
            .genres(["sci-fi".to_string()].into_iter().collect());
        let results = catalog.query(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.0, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let store = InMemoryHistoryStore::new();
        let history = store.get_purchase_history(UserId::new(404)).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_co_purchasers_excludes_requester() {
        let store = InMemoryHistoryStore::new();
        store.record_purchase(UserId::new(1), ItemId::new(10));
        store.record_purchase(UserId::new(2), ItemId::new(10));
        store.record_purchase(UserId::new(3), ItemId::new(99));

        let items: HashSet<ItemId> = [ItemId::new(10)].into_iter().collect();
        let neighbors = store.co_purchasers(&items, UserId::new(1)).await.unwrap();
        assert_eq!(neighbors, vec![UserId::new(2)]);
    }

    #[tokio::test]
    async fn test_wishlist_round_trip() {
        let store = InMemoryHistoryStore::new();
        let items: HashSet<ItemId> = [ItemId::new(1), ItemId::new(2)].into_iter().collect();
        store.set_wishlist(UserId::new(7), items.clone());
        assert_eq!(store.get_wishlist(UserId::new(7)).await.unwrap(), items);
    }
}
