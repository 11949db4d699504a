//! Domain layer: model types and collaborator ports.

pub mod model;
pub mod ports;

pub use model::{
    CatalogItem, ItemId, RecommendationRequest, RecommendationResult, Strategy, UserId,
    UserProfile,
};
pub use ports::{BookCatalog, CatalogQuery, UserHistoryStore};
