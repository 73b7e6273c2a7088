/*!
 * Translation result caching.
 *
 * Whole-batch results are cached under the target language, a fingerprint of
 * the batch content and the requested backend. The cache is bounded with LRU
 * eviction and lives as long as the hub that owns it.
 */

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::records::{Record, RecordSet};

/// Default number of cached batches
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Cache key combining target language, batch fingerprint and backend preference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Target language code
    target_language: String,

    /// SHA-256 of the serialized batch
    fingerprint: String,

    /// Requested backend, `None` for the fallback chain
    backend: Option<String>,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(records: &[Record], target_language: &str, backend: Option<&str>) -> Self {
        Self {
            target_language: target_language.to_string(),
            fingerprint: fingerprint(records),
            backend: backend.map(str::to_string),
        }
    }
}

/// Content fingerprint of a batch
pub fn fingerprint(records: &[Record]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        for (key, value) in record.fields() {
            hasher.update(key.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.to_json().to_string().as_bytes());
            hasher.update([0x1e]);
        }
        hasher.update([0x1d]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: usize,
    /// Lookups that found nothing
    pub misses: usize,
    /// Entries currently held
    pub entries: usize,
    /// Maximum entries
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded cache of translated batches
#[derive(Clone)]
pub struct TranslationCache {
    /// Internal cache storage
    cache: Arc<Mutex<LruCache<CacheKey, RecordSet>>>,

    /// Cache hit counter
    hits: Arc<AtomicUsize>,

    /// Cache miss counter
    misses: Arc<AtomicUsize>,
}

impl TranslationCache {
    /// Create a cache holding at most `capacity` batches (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get a cached batch
    pub fn get(&self, key: &CacheKey) -> Option<RecordSet> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(records) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit for batch {} ({})",
                    &key.fingerprint[..12],
                    key.target_language
                );
                Some(records.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a translated batch
    pub fn insert(&self, key: CacheKey, records: RecordSet) {
        self.cache.lock().put(key, records);
    }

    /// Drop one entry; true if it was present
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.cache.lock().pop(key).is_some()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: cache.len(),
            capacity: cache.cap().get(),
        }
    }

    /// Clear entries and counters
    pub fn clear(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
