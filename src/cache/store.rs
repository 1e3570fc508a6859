//! Eviction Cache Module
//!
//! Main cache engine combining HashMap storage with O(1) recency tracking,
//! count and memory bounds, and lazy TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tracing::{debug, trace};

use crate::cache::order::AccessOrder;
use crate::cache::{CacheCounters, CacheEntry, CacheOptions, CacheOptionsUpdate, CacheStats};

/// Extra headroom freed when the memory bound forces eviction.
const MEMORY_HEADROOM: f64 = 1.2;

// == Eviction Cache ==
/// Key-value cache with strict least-recently-used eviction.
///
/// Entries are evicted oldest-access-first whenever the entry count would
/// exceed `max_size` or the summed entry size would exceed `max_memory`.
/// Expired entries are dropped lazily on access, or eagerly by `cleanup`.
///
/// This type is single-threaded; wrap it in [`SharedCache`](crate::cache::SharedCache)
/// to share it across tasks.
#[derive(Debug)]
pub struct EvictionCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Recency order, head = most recently used
    order: AccessOrder<K>,
    /// Performance counters
    counters: CacheCounters,
    /// Sum of `entry.size` over all entries
    memory: usize,
    options: CacheOptions<V>,
}

impl<K, V> EvictionCache<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an empty cache with the given limits.
    pub fn new(options: CacheOptions<V>) -> Self {
        Self {
            entries: HashMap::new(),
            order: AccessOrder::new(),
            counters: CacheCounters::new(),
            memory: 0,
            options,
        }
    }

    // == Get ==
    /// Retrieves a value and marks it most recently used.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_miss();
            return None;
        }

        self.counters.record_hit();
        self.order.touch(key);
        let entry = self.entries.get_mut(key)?;
        entry.touch();
        Some(&entry.value)
    }

    // == Peek ==
    /// Reads a live value without touching recency or statistics.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| &entry.value)
    }

    // == Set ==
    /// Stores a value, overwriting any existing entry for the key.
    ///
    /// `ttl` overrides the default TTL; `None` or zero falls back to it.
    /// Oldest entries are evicted first when a bound would be exceeded. A
    /// value that alone exceeds `max_memory` is not stored.
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let size = self
            .options
            .size_fn
            .as_ref()
            .map(|size_fn| size_fn(&value))
            .unwrap_or(0);

        let max_memory = self.options.max_memory;
        if max_memory > 0 {
            if size > max_memory {
                debug!(size, max_memory, "Entry larger than memory limit, not cached");
                self.remove_entry(&key);
                return;
            }

            let existing = self.entries.get(&key).map(|entry| entry.size).unwrap_or(0);
            if self.memory - existing + size > max_memory {
                self.ensure_space(&key, size);
            }
        }

        let max_size = self.options.max_size;
        if max_size > 0 && !self.entries.contains_key(&key) {
            while self.entries.len() >= max_size && self.evict_oldest().is_some() {}
        }

        let ttl = ttl.filter(|ttl| !ttl.is_zero()).or(self.options.default_ttl);
        let entry = CacheEntry::new(value, ttl, size);

        self.memory += size;
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.memory -= previous.size;
        }
        self.order.touch(&key);
    }

    // == Has ==
    /// Checks whether a live entry exists.
    ///
    /// Counts as a lookup: hits and misses are recorded exactly as by `get`,
    /// and a hit refreshes recency.
    pub fn has(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    // == Delete ==
    /// Removes an entry. Returns true if it existed.
    pub fn delete(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes all entries and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.memory = 0;
        self.counters.reset();
    }

    // == Iteration ==
    /// Returns all stored keys, most recently used first.
    ///
    /// Expired entries that have not been swept yet are included.
    pub fn keys(&self) -> Vec<K> {
        self.order.iter().cloned().collect()
    }

    /// Iterates stored key-value pairs, most recently used first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let entries = &self.entries;
        self.order
            .iter()
            .filter_map(move |key| entries.get(key).map(|entry| (key, &entry.value)))
    }

    /// Returns all stored values, most recently used first.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Returns all stored key-value pairs, most recently used first.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the summed size of all entries in bytes.
    pub fn memory_usage(&self) -> usize {
        self.memory
    }

    // == Cleanup ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        let now = tokio::time::Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        expired.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.options.max_size,
            memory_usage: self.memory,
            max_memory: self.options.max_memory,
            hit_rate: self.counters.hit_rate(),
            hits: self.counters.hits,
            misses: self.counters.misses,
            evictions: self.counters.evictions,
        }
    }

    pub fn options(&self) -> &CacheOptions<V> {
        &self.options
    }

    // == Update Options ==
    /// Hot-swaps limits without dropping entries.
    ///
    /// Tightened limits take effect on the next `set`.
    pub fn update_options(&mut self, update: CacheOptionsUpdate<V>) {
        update.apply_to(&mut self.options);
        debug!(options = ?self.options, "Cache options updated");
    }

    // == Destroy ==
    /// Drops all state. Safe to call more than once.
    pub fn destroy(&mut self) {
        self.clear();
    }

    // == Eviction Internals ==
    /// Evicts oldest entries until `1.2 × size` bytes are freed and `size`
    /// more bytes fit under the memory limit. `incoming` is the key being
    /// written; its current size is not counted against the limit.
    fn ensure_space(&mut self, incoming: &K, size: usize) {
        let target = size as f64 * MEMORY_HEADROOM;
        let mut freed = 0usize;

        while !self.entries.is_empty() {
            let existing = self.entries.get(incoming).map(|entry| entry.size).unwrap_or(0);
            let fits = self.memory - existing + size <= self.options.max_memory;
            if fits && freed as f64 >= target {
                break;
            }
            match self.evict_oldest() {
                Some(evicted) => freed += evicted,
                None => break,
            }
        }
    }

    /// Evicts the least recently used entry, returning its size.
    fn evict_oldest(&mut self) -> Option<usize> {
        let key = self.order.pop_oldest()?;
        let entry = self.entries.remove(&key)?;
        self.memory -= entry.size;
        self.counters.record_eviction();
        trace!(size = entry.size, "Evicted oldest cache entry");
        Some(entry.size)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(key);
        self.memory -= entry.size;
        Some(entry)
    }
}

impl<K, V> Default for EvictionCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn string_cache(max_size: usize) -> EvictionCache<String, String> {
        EvictionCache::new(CacheOptions::default().with_max_size(max_size))
    }

    fn byte_cache(max_memory: usize) -> EvictionCache<&'static str, Vec<u8>> {
        EvictionCache::new(
            CacheOptions::default()
                .with_max_memory(max_memory)
                .with_size_fn(|value: &Vec<u8>| value.len()),
        )
    }

    #[test]
    fn test_cache_new() {
        let cache = string_cache(100);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), None);

        assert_eq!(cache.get(&"key1".to_string()), Some(&"value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent_is_miss() {
        let mut cache = string_cache(100);

        assert_eq!(cache.get(&"nonexistent".to_string()), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_delete() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), None);

        assert!(cache.delete(&"key1".to_string()));
        assert!(!cache.delete(&"key1".to_string()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), None);
        cache.set("key1".to_string(), "value2".to_string(), None);

        assert_eq!(cache.get(&"key1".to_string()), Some(&"value2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overwrite_at_capacity_evicts_nothing() {
        let mut cache = string_cache(2);

        cache.set("a".to_string(), "1".to_string(), None);
        cache.set("b".to_string(), "2".to_string(), None);
        cache.set("a".to_string(), "3".to_string(), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_ttl_expiration() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), Some(Duration::from_millis(50)));

        assert!(cache.get(&"key1".to_string()).is_some());

        sleep(Duration::from_millis(80));

        assert!(cache.get(&"key1".to_string()).is_none());
        assert_eq!(cache.len(), 0, "expired entry is deleted on access");
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_default_ttl_applies_without_explicit_ttl() {
        let mut cache: EvictionCache<&str, u32> =
            EvictionCache::new(CacheOptions::default().with_default_ttl(Duration::from_millis(50)));

        cache.set("short", 1, None);
        cache.set("long", 2, Some(Duration::from_secs(60)));

        sleep(Duration::from_millis(80));

        assert!(cache.get(&"short").is_none());
        assert_eq!(cache.get(&"long"), Some(&2));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = string_cache(3);

        cache.set("key1".to_string(), "value1".to_string(), None);
        cache.set("key2".to_string(), "value2".to_string(), None);
        cache.set("key3".to_string(), "value3".to_string(), None);

        // Cache is full, adding key4 should evict key1 (oldest)
        cache.set("key4".to_string(), "value4".to_string(), None);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&"key1".to_string()).is_none());
        assert!(cache.get(&"key2".to_string()).is_some());
        assert!(cache.get(&"key3".to_string()).is_some());
        assert!(cache.get(&"key4".to_string()).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lru_touch_on_get() {
        let mut cache = string_cache(3);

        cache.set("key1".to_string(), "value1".to_string(), None);
        cache.set("key2".to_string(), "value2".to_string(), None);
        cache.set("key3".to_string(), "value3".to_string(), None);

        // Access key1 to make it most recently used
        cache.get(&"key1".to_string());

        // Adding key4 should evict key2 (now oldest)
        cache.set("key4".to_string(), "value4".to_string(), None);

        assert!(cache.get(&"key1".to_string()).is_some());
        assert!(cache.get(&"key2".to_string()).is_none());
    }

    #[test]
    fn test_peek_does_not_touch_or_count() {
        let mut cache = string_cache(2);

        cache.set("a".to_string(), "1".to_string(), None);
        cache.set("b".to_string(), "2".to_string(), None);
        assert_eq!(cache.peek(&"a".to_string()), Some(&"1".to_string()));

        cache.set("c".to_string(), "3".to_string(), None);

        assert!(cache.peek(&"a".to_string()).is_none(), "peek must not refresh recency");
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_has_counts_like_get() {
        let mut cache = string_cache(10);
        cache.set("a".to_string(), "1".to_string(), None);

        assert!(cache.has(&"a".to_string()));
        assert!(!cache.has(&"b".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_memory_limit_evicts_with_headroom() {
        let mut cache = byte_cache(100);

        cache.set("a", vec![0; 30], None);
        cache.set("b", vec![0; 30], None);
        cache.set("c", vec![0; 30], None);
        assert_eq!(cache.memory_usage(), 90);

        // 90 + 20 > 100: must free at least 24 bytes, so only "a" goes
        cache.set("d", vec![0; 20], None);

        assert_eq!(cache.keys(), vec!["d", "c", "b"]);
        assert_eq!(cache.memory_usage(), 80);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_memory_limit_headroom_can_evict_several() {
        let mut cache = byte_cache(100);

        for key in ["a", "b", "c", "d", "e"] {
            cache.set(key, vec![0; 20], None);
        }

        // Needs 40 × 1.2 = 48 bytes freed: three entries of 20
        cache.set("f", vec![0; 40], None);

        assert_eq!(cache.keys(), vec!["f", "e", "d"]);
        assert_eq!(cache.memory_usage(), 80);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_memory_overwrite_discounts_existing_entry() {
        let mut cache = byte_cache(100);

        cache.set("a", vec![0; 50], None);
        cache.set("b", vec![0; 40], None);
        cache.set("a", vec![0; 60], None);

        assert_eq!(cache.memory_usage(), 100);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_oversized_entry_is_not_cached() {
        let mut cache = byte_cache(100);

        cache.set("small", vec![0; 10], None);
        cache.set("huge", vec![0; 101], None);

        assert!(cache.peek(&"huge").is_none());
        assert_eq!(cache.keys(), vec!["small"]);
        assert_eq!(cache.memory_usage(), 10);
    }

    #[test]
    fn test_keys_values_entries_most_recent_first() {
        let mut cache: EvictionCache<&str, u32> = EvictionCache::default();

        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);
        cache.get(&"a");

        assert_eq!(cache.keys(), vec!["a", "c", "b"]);
        assert_eq!(cache.values(), vec![1, 3, 2]);
        assert_eq!(cache.entries(), vec![("a", 1), ("c", 3), ("b", 2)]);
    }

    #[test]
    fn test_cleanup_expired() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), Some(Duration::from_millis(30)));
        cache.set("key2".to_string(), "value2".to_string(), Some(Duration::from_secs(10)));

        sleep(Duration::from_millis(60));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&"key2".to_string()).is_some());
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut cache = string_cache(1);
        cache.set("a".to_string(), "1".to_string(), None);
        cache.set("b".to_string(), "2".to_string(), None);
        cache.get(&"b".to_string());

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_stats() {
        let mut cache = string_cache(100);

        cache.set("key1".to_string(), "value1".to_string(), None);
        cache.get(&"key1".to_string()); // hit
        cache.get(&"nonexistent".to_string()); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 100);
    }

    #[test]
    fn test_update_options_keeps_entries() {
        let mut cache = string_cache(3);
        cache.set("a".to_string(), "1".to_string(), None);
        cache.set("b".to_string(), "2".to_string(), None);
        cache.set("c".to_string(), "3".to_string(), None);

        cache.update_options(CacheOptionsUpdate {
            max_size: Some(2),
            ..Default::default()
        });
        assert_eq!(cache.len(), 3, "shrinking applies on the next set");

        cache.set("d".to_string(), "4".to_string(), None);
        assert_eq!(cache.keys(), vec!["d".to_string(), "c".to_string()]);
        assert_eq!(cache.stats().max_size, 2);
    }

    #[test]
    fn test_update_options_size_fn() {
        let mut cache: EvictionCache<&str, String> = EvictionCache::default();
        cache.set("before", "xxxx".to_string(), None);

        cache.update_options(CacheOptionsUpdate {
            size_fn: Some(std::sync::Arc::new(|value: &String| value.len())),
            ..Default::default()
        });
        cache.set("after", "yyyyyy".to_string(), None);

        assert_eq!(cache.memory_usage(), 6);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut cache = string_cache(10);
        cache.set("a".to_string(), "1".to_string(), None);

        cache.destroy();
        cache.destroy();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }
}
