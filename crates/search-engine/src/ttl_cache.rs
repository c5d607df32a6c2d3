//! A small TTL + bounded-size cache shared by the embedding, analyzer and
//! result caches (spec §4.C, §4.H, §4.I all specify the same eviction
//! shape: evict expired first, then evict the single oldest by insertion
//! time). Grounded on the `SpecCache` pattern (insert-time-stamped entries,
//! `retain`-based pruning), adapted from `Mutex<HashMap>` to `DashMap` to
//! match this workspace's concurrency idiom.

use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// A concurrent, process-local cache keyed by `String`, entries expiring
/// after their own TTL, bounded to `capacity` entries.
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, Entry<V>>,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self { entries: DashMap::new(), capacity }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            return Some(entry.value.clone());
        }
        None
    }

    /// Insert a value, pruning expired entries first and, if the cache is
    /// still at capacity, evicting the single oldest entry by insertion time.
    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        self.prune_expired();
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(key, Entry { value, inserted_at: Instant::now(), ttl });
    }

    pub fn prune_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        assert!(cache.get("a").is_none());
        cache.insert("a".to_string(), 42, Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(42));
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        cache.insert("a".to_string(), 1, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let cache: TtlCache<u32> = TtlCache::new(2);
        cache.insert("a".to_string(), 1, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".to_string(), 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".to_string(), 3, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn reinserting_existing_key_does_not_count_toward_capacity() {
        let cache: TtlCache<u32> = TtlCache::new(1);
        cache.insert("a".to_string(), 1, Duration::from_secs(60));
        cache.insert("a".to_string(), 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }
}
