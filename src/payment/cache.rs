//! LRU cache for verified token transfers.
//!
//! Transfer validation is idempotent and a transaction hash is immutable
//! once mined, so a `(tx, sender, receiver, token)` tuple that validated
//! once stays valid. Caching the verified event value lets repeated
//! requests against the same payment skip the chain round-trips.

use ethereum_types::{H160, H256, U256};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Identity of a validated transfer.
pub type TransferKey = (H256, H160, H160, H160);

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// LRU cache mapping verified transfers to their event value.
///
/// The expected amount is deliberately not part of the key: the cached
/// entry stores what was actually transferred, and every hit re-checks the
/// caller's amount against it.
#[derive(Clone)]
pub struct VerifiedTransfers {
    inner: Arc<Mutex<LruCache<TransferKey, U256>>>,
    stats: Arc<Mutex<CacheStats>>,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl VerifiedTransfers {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Look up the verified event value for a transfer, if cached.
    pub fn verified_value(&self, key: &TransferKey) -> Option<U256> {
        let mut cache = self.inner.lock();
        let found = cache.get(key).copied();

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Record a transfer that passed the full validation chain.
    pub fn insert(&self, key: TransferKey, value: U256) {
        let mut cache = self.inner.lock();
        cache.put(key, value);

        let mut stats = self.stats.lock();
        stats.additions += 1;
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for VerifiedTransfers {
    fn default() -> Self {
        Self::new()
    }
}
