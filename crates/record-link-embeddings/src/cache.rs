//! Bounded embedding cache.
//!
//! Stores vectors keyed by xxhash64 of normalized input text, backed by a
//! moka concurrent cache with explicit capacity. Hit/miss counters use
//! atomics so readers never contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use xxhash_rust::xxh64::xxh64;

/// Cache key: xxhash64 of normalized input text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(pub u64);

impl CacheKey {
    #[inline]
    pub fn from_text(text: &str) -> Self {
        Self(xxh64(text.as_bytes(), 0))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hit/miss statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let h = self.hits() as f64;
        let total = h + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            h / total
        }
    }
}

/// Bounded, thread-safe embedding cache.
pub struct EmbeddingCache {
    inner: Cache<CacheKey, Arc<Vec<f32>>>,
    stats: CacheStats,
}

impl EmbeddingCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, key: CacheKey) -> Option<Arc<Vec<f32>>> {
        match self.inner.get(&key) {
            Some(v) => {
                self.stats.record_hit();
                Some(v)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, vector: Arc<Vec<f32>>) {
        self.inner.insert(key, vector);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Entry count is eventually consistent under moka; callers must not
    /// use it for correctness decisions.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_are_counted() {
        let cache = EmbeddingCache::new(16);
        let key = CacheKey::from_text("john doe");
        assert!(cache.get(key).is_none());
        cache.insert(key, Arc::new(vec![1.0, 0.0]));
        assert!(cache.get(key).is_some());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn key_is_deterministic() {
        assert_eq!(CacheKey::from_text("abc"), CacheKey::from_text("abc"));
        assert_ne!(CacheKey::from_text("abc"), CacheKey::from_text("abd"));
    }
}
