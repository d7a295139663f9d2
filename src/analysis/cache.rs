use git2::Oid;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::types::CoverageVector;

const DEFAULT_CAPACITY: usize = 1024;

/// Keeps recently decoded coverage vectors, keyed by the blob that stores them
pub struct CoverageCache {
    cache: LruCache<Oid, Arc<CoverageVector>>,
}

impl CoverageCache {
    /// Create a cache holding at most `capacity` vectors
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Store a decoded vector in the cache
    pub fn store(&mut self, blob: Oid, coverage: Arc<CoverageVector>) {
        self.cache.put(blob, coverage);
    }

    /// Retrieve a vector from the cache
    pub fn get(&mut self, blob: &Oid) -> Option<Arc<CoverageVector>> {
        self.cache.get(blob).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for CoverageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
