//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Last access instant, refreshed on every hit
    pub timestamp: Instant,
    /// Absolute expiry instant, None = never expires
    pub expires: Option<Instant>,
    /// Byte cost reported by the size function (0 if uncounted)
    pub size: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Optional time-to-live measured from now
    /// * `size` - Byte cost of the value
    pub fn new(value: V, ttl: Option<Duration>, size: usize) -> Self {
        let now = Instant::now();

        Self {
            value,
            timestamp: now,
            expires: ttl.map(|ttl| now + ttl),
            size,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry stays live up to and including its expiry instant; it is
    /// expired only once `now` is strictly past it.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Checks if the entry has expired at the current instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Touch ==
    /// Refreshes the last access instant.
    pub fn touch(&mut self) {
        self.timestamp = Instant::now();
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a TTL that hasn't elapsed
    /// - `None` if the entry never expires
    #[cfg(test)]
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
