//! TTL + LRU Cache
//!
//! A generic key/value cache with per-entry TTL, strict least-recently-
//! accessed eviction at capacity, prefix/predicate invalidation, and a
//! background sweeper that removes expired entries in bounded batches.
//!
//! # Design
//!
//! - Hash map + slab-backed doubly-linked access list: O(1) get/set
//! - One short mutex around the structure; atomic hit/miss counters outside
//! - Expiry measured from insertion; a hit refreshes recency, never TTL
//! - Capacity 0 disables caching (valid configuration, every call a miss)

mod entry;
mod store;
mod sweeper;

pub use entry::CacheEntry;
pub use store::{CacheStats, CacheStore};
pub use sweeper::spawn_sweeper;

/// Default number of entries a sweep pass may examine under the lock.
pub const DEFAULT_SWEEP_BATCH: usize = 256;
