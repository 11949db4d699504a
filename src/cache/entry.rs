//! Cache entry bookkeeping
//!
//! Entries live under the store's lock, so plain fields suffice; the store
//! is the only writer of access times.

use std::time::{Duration, Instant};

/// A cached value with its TTL and access bookkeeping.
///
/// Owned exclusively by [`CacheStore`](super::CacheStore); evicted only by
/// TTL expiry, explicit invalidation, or LRU capacity pressure.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed: now,
            ttl,
        }
    }

    /// Expiry is measured from insertion, not last access.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }

    /// Record an access.
    #[inline]
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

// =============================================================================
// Tests
// =============================================================================
