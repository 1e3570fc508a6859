//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Counters ==
/// Running hit/miss/eviction counters owned by a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheCounters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to satisfy a count or memory bound
    pub evictions: u64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the hit rate as a percentage in `[0, 100]`.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Cache Stats ==
/// Point-in-time snapshot of a cache's size, limits and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Entry limit (0 = unlimited)
    pub max_size: usize,
    /// Sum of entry sizes in bytes
    pub memory_usage: usize,
    /// Memory limit in bytes (0 = unlimited)
    pub max_memory: usize,
    /// Hit rate percentage (0-100)
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
