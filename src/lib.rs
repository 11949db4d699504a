//! ShelfRank - Bookstore Recommendation Engine
//!
//! Recommendation ranking and caching for an online bookstore. Computes
//! ranked book lists under four strategies (trending, content-based,
//! collaborative, hybrid), serves them through a TTL + LRU cache with
//! per-key single-flight, and degrades to trending when a strategy times
//! out or its data is missing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Recommendation Service                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  CacheStore  │◀──▶│   Service    │───▶│   Strategy   │       │
//! │  │  (TTL + LRU) │    │ (singleflight│    │    Engine    │       │
//! │  │              │    │  + degrade)  │    │ (4 rankers)  │       │
//! │  └──────────────┘    └──────────────┘    └──────┬───────┘       │
//! │                                                 ▼               │
//! │                                   BookCatalog / UserHistoryStore │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory adapters implementing the domain ports
//! - [`cache`] - TTL + LRU cache store and background sweeper
//! - [`config`] - Engine configuration and validation
//! - [`domain`] - Domain model, request/result types, and ports
//! - [`error`] - Error types
//! - [`rank`] - Bounded top-K selection
//! - [`scoring`] - Content similarity scoring
//! - [`service`] - The recommendation service facade
//! - [`strategy`] - The four recommendation strategies

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod rank;
pub mod scoring;
pub mod service;
pub mod strategy;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStore};
pub use config::{EngineConfig, HybridWeights};
pub use domain::{
    BookCatalog, CatalogItem, ItemId, RecommendationRequest, RecommendationResult, Strategy,
    UserHistoryStore, UserId, UserProfile,
};
pub use error::{Error, Result};
pub use service::{RecommendationService, ServiceStats};
pub use strategy::{StrategyEngine, StrategyOutcome};
