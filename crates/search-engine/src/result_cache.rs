//! Result Cache (spec §4.I). A strict read-through/write-through side
//! channel in front of the search engine — never authoritative. Reuses
//! [`crate::ttl_cache::TtlCache`].

use std::time::Duration;

use search_core::SearchFilters;
use sha2::{Digest, Sha256};

use crate::ttl_cache::TtlCache;

const DEFAULT_TTL_SECS: u64 = 2 * 60;
const DEFAULT_CAPACITY: usize = 500;
const KEY_BYTES: usize = 16;

/// Identifies the parts of a request that determine its response shape, for
/// cache-key purposes (spec §4.I "Key = SHA-256 over (...)").
pub struct CacheKeyParts<'a> {
    pub query: &'a str,
    pub strategy: &'a str,
    pub page: u32,
    pub per_page: u32,
    pub collections: &'a [String],
    pub mode: &'a str,
    pub alpha: f64,
    pub threshold: Option<f64>,
    pub expand: bool,
    pub recency: bool,
    pub filters: &'a SearchFilters,
}

/// Build the 16-byte hex cache key for a search request.
pub fn cache_key(parts: &CacheKeyParts) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.query.as_bytes());
    hasher.update(parts.strategy.as_bytes());
    hasher.update(parts.page.to_le_bytes());
    hasher.update(parts.per_page.to_le_bytes());
    for collection in parts.collections {
        hasher.update(collection.as_bytes());
    }
    hasher.update(parts.mode.as_bytes());
    hasher.update(parts.alpha.to_le_bytes());
    hasher.update(parts.threshold.unwrap_or(-1.0).to_le_bytes());
    hasher.update([parts.expand as u8, parts.recency as u8]);
    hasher.update(parts.filters.status.as_deref().unwrap_or("").as_bytes());
    hasher.update(parts.filters.category.as_deref().unwrap_or("").as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..KEY_BYTES])
}

/// Read-through/write-through cache of serialized search responses, keyed by
/// `cache_key`. Callers are responsible for never calling this under the
/// `ai` strategy — AI responses are not cached (spec §4.I).
pub struct ResultCache {
    inner: TtlCache<String>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CAPACITY, Duration::from_secs(DEFAULT_TTL_SECS))
    }

    pub fn with_capacity_and_ttl(capacity: usize, ttl: Duration) -> Self {
        Self { inner: TtlCache::new(capacity), ttl }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    pub fn put(&self, key: String, response_json: String) {
        self.inner.insert(key, response_json, self.ttl);
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(query: &'a str, filters: &'a SearchFilters) -> CacheKeyParts<'a> {
        CacheKeyParts {
            query,
            strategy: "hybrid",
            page: 1,
            per_page: 10,
            collections: &[],
            mode: "human",
            alpha: 0.3,
            threshold: None,
            expand: true,
            recency: true,
            filters,
        }
    }

    #[test]
    fn key_is_16_bytes_hex() {
        let filters = SearchFilters::default();
        let key = cache_key(&parts("iptu", &filters));
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn different_queries_produce_different_keys() {
        let filters = SearchFilters::default();
        let a = cache_key(&parts("iptu", &filters));
        let b = cache_key(&parts("cnh", &filters));
        assert_ne!(a, b);
    }

    #[test]
    fn same_inputs_produce_same_key() {
        let filters = SearchFilters::default();
        let a = cache_key(&parts("iptu", &filters));
        let b = cache_key(&parts("iptu", &filters));
        assert_eq!(a, b);
    }

    #[test]
    fn cache_roundtrips() {
        let cache = ResultCache::new();
        let filters = SearchFilters::default();
        let key = cache_key(&parts("iptu", &filters));
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), "{\"hits\":[]}".to_string());
        assert_eq!(cache.get(&key), Some("{\"hits\":[]}".to_string()));
    }
}
