//! TTL + LRU key/value cache
//!
//! Hash map for O(1) lookup plus a slab-backed doubly-linked access list for
//! O(1) recency updates and strict least-recently-accessed eviction. All
//! mutation happens under one short `parking_lot` mutex; hit/miss counters
//! are atomics outside it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::entry::CacheEntry;
use crate::error::{Error, Result};

/// Sentinel index for list ends and free slots.
const NIL: usize = usize::MAX;

struct Node<V> {
    key: String,
    entry: CacheEntry<V>,
    prev: usize,
    next: usize,
}

struct Inner<V> {
    /// key -> slab index
    map: HashMap<String, usize>,
    /// node storage; `None` slots are on the free list
    slab: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    /// most recently accessed
    head: usize,
    /// least recently accessed
    tail: usize,
    /// rotating sweep position
    cursor: usize,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            slab: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            cursor: 0,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slab[idx].as_ref().expect("detach of free slot");
            (node.prev, node.next)
        };
        match prev {
            NIL => self.head = next,
            p => self.slab[p].as_mut().expect("linked prev").next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.slab[n].as_mut().expect("linked next").prev = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slab[idx].as_mut().expect("push of free slot");
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            self.slab[old_head].as_mut().expect("old head").prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn insert(&mut self, key: String, entry: CacheEntry<V>) {
        let node = Node {
            key: key.clone(),
            entry,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slab[idx] = Some(node);
                idx
            }
            None => {
                self.slab.push(Some(node));
                self.slab.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn remove_index(&mut self, idx: usize) -> Node<V> {
        self.detach(idx);
        let node = self.slab[idx].take().expect("remove of free slot");
        self.map.remove(&node.key);
        self.free.push(idx);
        node
    }

    fn remove_key(&mut self, key: &str) -> Option<Node<V>> {
        let idx = self.map.get(key).copied()?;
        Some(self.remove_index(idx))
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expired: u64,
}

/// Generic TTL+LRU cache keyed by string.
///
/// Capacity 0 disables caching: every `set` is an acknowledged no-op and
/// every `get` a miss. This is a valid configuration, not an error.
pub struct CacheStore<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Get a value. Expired entries are removed on sight and counted as
    /// misses; hits refresh recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let Some(idx) = inner.map.get(key).copied() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let is_expired = inner.slab[idx]
            .as_ref()
            .expect("mapped slot")
            .entry
            .is_expired(now);
        if is_expired {
            inner.remove_index(idx);
            self.expired.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        inner.detach(idx);
        inner.push_front(idx);
        let node = inner.slab[idx].as_mut().expect("mapped slot");
        node.entry.touch(now);
        let value = node.entry.value().clone();
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Insert or replace a value. Zero TTL is rejected; at capacity the
    /// least-recently-accessed entry is evicted first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::InvalidArgument("cache TTL must be positive".into()));
        }
        if self.capacity == 0 {
            return Ok(());
        }

        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(idx) = inner.map.get(&key).copied() {
            // Replace in place, refresh insertion time and recency
            inner.detach(idx);
            inner.push_front(idx);
            let node = inner.slab[idx].as_mut().expect("mapped slot");
            node.entry = CacheEntry::new(value, ttl, now);
            return Ok(());
        }

        if inner.map.len() >= self.capacity {
            let tail = inner.tail;
            debug_assert_ne!(tail, NIL);
            inner.remove_index(tail);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        inner.insert(key, CacheEntry::new(value, ttl, now));
        Ok(())
    }

    /// Remove one key. Returns true when something was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().remove_key(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. O(n) sweep.
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        self.invalidate_matching(|key| key.starts_with(prefix))
    }

    /// Remove every entry whose key matches the predicate. O(n) sweep.
    pub fn invalidate_matching(&self, pred: impl Fn(&str) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let victims: Vec<usize> = inner
            .map
            .iter()
            .filter(|(key, _)| pred(key))
            .map(|(_, idx)| *idx)
            .collect();
        for idx in &victims {
            inner.remove_index(*idx);
        }
        victims.len()
    }

    /// Remove expired entries, examining at most `max_entries` live slots
    /// under the lock. A rotating cursor gives successive passes coverage
    /// of the whole key space. Returns the number removed.
    pub fn sweep_expired(&self, max_entries: usize) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let slots = inner.slab.len();
        if slots == 0 {
            return 0;
        }

        let mut idx = inner.cursor % slots;
        let mut examined = 0;
        let mut visited = 0;
        let mut removed = 0;

        while examined < max_entries && visited < slots {
            match inner.slab[idx].as_ref() {
                Some(node) if node.entry.is_expired(now) => {
                    inner.remove_index(idx);
                    removed += 1;
                    examined += 1;
                }
                Some(_) => examined += 1,
                None => {}
            }
            idx = (idx + 1) % slots;
            visited += 1;
        }

        inner.cursor = idx;
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = Inner::new();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits,
            misses,
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            evictions: self.evictions(),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
