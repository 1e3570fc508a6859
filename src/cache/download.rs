//! Download Cache Module
//!
//! Payload cache for completed downloads: a `SharedCache<String, Payload>`
//! with byte-length accounting and a 24 hour default TTL.

use std::time::Duration;

use bytes::Bytes;

use crate::cache::{CacheOptions, CacheOptionsUpdate, CacheStats, SharedCache};

/// Default number of payloads kept.
pub const DEFAULT_DOWNLOAD_MAX_ENTRIES: usize = 100;

/// Default payload lifetime.
pub const DEFAULT_DOWNLOAD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// == Payload ==
/// A downloaded body and its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// == Download Cache ==
/// Cloneable cache of downloaded payloads keyed by task id or URL.
#[derive(Clone)]
pub struct DownloadCache {
    inner: SharedCache<String, Payload>,
}

impl DownloadCache {
    // == Constructor ==
    /// Creates a cache holding up to `max_size` payloads for `default_ttl`.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self::with_options(
            CacheOptions::default()
                .with_max_size(max_size)
                .with_default_ttl(default_ttl),
        )
    }

    /// Creates a cache from explicit options.
    ///
    /// Payload byte length is used as the entry size unless the options
    /// already carry a size function.
    pub fn with_options(mut options: CacheOptions<Payload>) -> Self {
        if options.size_fn.is_none() {
            options = options.with_size_fn(Payload::len);
        }
        Self {
            inner: SharedCache::new(options),
        }
    }

    pub fn get(&self, key: &str) -> Option<Payload> {
        self.inner.get(&key.to_string())
    }

    pub fn set(&self, key: impl Into<String>, payload: Payload, ttl: Option<Duration>) {
        self.inner.set(key.into(), payload, ttl);
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.has(&key.to_string())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.delete(&key.to_string())
    }

    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Payloads, most recently used first.
    pub fn values(&self) -> Vec<Payload> {
        self.inner.values()
    }

    /// Key-payload pairs, most recently used first.
    pub fn entries(&self) -> Vec<(String, Payload)> {
        self.inner.entries()
    }

    // == Memory Accounting ==
    /// Sums payload byte lengths across all entries.
    ///
    /// Unlike `stats().memory_usage` this does not depend on the configured
    /// size function.
    pub fn memory_usage(&self) -> usize {
        self.inner
            .with(|cache| cache.iter().map(|(_, payload)| payload.len()).sum())
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats();
        stats.memory_usage = self.memory_usage();
        stats
    }

    pub fn update_options(&self, update: CacheOptionsUpdate<Payload>) {
        self.inner.update_options(update);
    }

    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Returns the underlying generic cache handle.
    pub fn shared(&self) -> &SharedCache<String, Payload> {
        &self.inner
    }
}

impl Default for DownloadCache {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_MAX_ENTRIES, DEFAULT_DOWNLOAD_TTL)
    }
}

impl std::fmt::Debug for DownloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCache")
            .field("stats", &self.stats())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn payload(len: usize) -> Payload {
        Payload::new(vec![7u8; len], Some("application/octet-stream".to_string()))
    }

    #[tokio::test]
    async fn test_values_and_entries_in_recency_order() {
        let cache = DownloadCache::new(10, Duration::from_secs(60));
        cache.set("a", payload(1), None);
        cache.set("b", payload(2), None);
        assert!(cache.get("a").is_some());

        let lengths: Vec<usize> = cache.values().iter().map(Payload::len).collect();
        assert_eq!(lengths, vec![1, 2]);

        let keys: Vec<String> = cache.entries().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_defaults() {
        let cache = DownloadCache::default();
        let stats = cache.stats();
        assert_eq!(stats.max_size, DEFAULT_DOWNLOAD_MAX_ENTRIES);
        assert_eq!(
            cache.shared().with(|c| c.options().default_ttl),
            Some(DEFAULT_DOWNLOAD_TTL)
        );
    }

    #[test]
    fn test_set_get_roundtrip_keeps_content_type() {
        let cache = DownloadCache::default();
        cache.set("avatar", payload(16), None);

        let hit = cache.get("avatar").unwrap();
        assert_eq!(hit.len(), 16);
        assert_eq!(hit.content_type.as_deref(), Some("application/octet-stream"));
        assert!(cache.has("avatar"));
        assert!(!cache.has("missing"));
    }

    #[test]
    fn test_memory_usage_sums_payloads() {
        let cache = DownloadCache::default();
        cache.set("a", payload(10), None);
        cache.set("b", payload(25), None);
        cache.set("a", payload(5), None);

        assert_eq!(cache.memory_usage(), 30);
        assert_eq!(cache.stats().memory_usage, 30);
    }

    #[test]
    fn test_memory_usage_ignores_custom_size_fn() {
        let cache = DownloadCache::with_options(CacheOptions::default().with_size_fn(|_: &Payload| 1));
        cache.set("a", payload(100), None);

        assert_eq!(cache.shared().memory_usage(), 1);
        assert_eq!(cache.memory_usage(), 100);
    }

    #[test]
    fn test_count_limit_evicts_oldest() {
        let cache = DownloadCache::new(2, DEFAULT_DOWNLOAD_TTL);
        cache.set("a", payload(1), None);
        cache.set("b", payload(1), None);
        cache.set("c", payload(1), None);

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_explicit_ttl_expires() {
        let cache = DownloadCache::default();
        cache.set("short", payload(1), Some(Duration::from_millis(30)));

        sleep(Duration::from_millis(60));

        assert!(cache.get("short").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = DownloadCache::default();
        cache.set("a", payload(1), None);
        cache.set("b", payload(1), None);

        assert!(cache.delete("a"));
        assert_eq!(cache.keys(), vec!["b".to_string()]);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
