//! Cache Options Module
//!
//! Construction-time limits for the eviction cache and partial updates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the byte cost of a cached value.
pub type SizeFn<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

// == Cache Options ==
/// Limits and behaviour of an `EvictionCache`.
///
/// Zero limits mean "unlimited"; `None` durations mean "disabled".
pub struct CacheOptions<V> {
    /// Maximum number of entries (0 = unlimited)
    pub max_size: usize,
    /// Maximum summed entry size in bytes (0 = unlimited)
    pub max_memory: usize,
    /// TTL applied when `set` is called without one
    pub default_ttl: Option<Duration>,
    /// Size calculator; entries cost 0 bytes without one
    pub size_fn: Option<SizeFn<V>>,
    /// Period of the background expired-entry sweep
    pub cleanup_interval: Option<Duration>,
}

impl<V> CacheOptions<V> {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_memory(mut self, max_memory: usize) -> Self {
        self.max_memory = max_memory;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = normalize_duration(Some(ttl));
        self
    }

    pub fn with_size_fn<F>(mut self, size_fn: F) -> Self
    where
        F: Fn(&V) -> usize + Send + Sync + 'static,
    {
        self.size_fn = Some(Arc::new(size_fn));
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = normalize_duration(Some(interval));
        self
    }
}

impl<V> Default for CacheOptions<V> {
    fn default() -> Self {
        Self {
            max_size: 0,
            max_memory: 0,
            default_ttl: None,
            size_fn: None,
            cleanup_interval: None,
        }
    }
}

impl<V> Clone for CacheOptions<V> {
    fn clone(&self) -> Self {
        Self {
            max_size: self.max_size,
            max_memory: self.max_memory,
            default_ttl: self.default_ttl,
            size_fn: self.size_fn.clone(),
            cleanup_interval: self.cleanup_interval,
        }
    }
}

impl<V> fmt::Debug for CacheOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("max_size", &self.max_size)
            .field("max_memory", &self.max_memory)
            .field("default_ttl", &self.default_ttl)
            .field("size_fn", &self.size_fn.is_some())
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

// == Options Update ==
/// Partial update for `update_options`. `None` fields are left untouched.
///
/// For the duration fields, `Some(Duration::ZERO)` disables the feature.
pub struct CacheOptionsUpdate<V> {
    pub max_size: Option<usize>,
    pub max_memory: Option<usize>,
    pub default_ttl: Option<Duration>,
    pub size_fn: Option<SizeFn<V>>,
    pub cleanup_interval: Option<Duration>,
}

impl<V> Default for CacheOptionsUpdate<V> {
    fn default() -> Self {
        Self {
            max_size: None,
            max_memory: None,
            default_ttl: None,
            size_fn: None,
            cleanup_interval: None,
        }
    }
}

impl<V> CacheOptionsUpdate<V> {
    /// Applies this update on top of `options`.
    pub(crate) fn apply_to(self, options: &mut CacheOptions<V>) {
        if let Some(max_size) = self.max_size {
            options.max_size = max_size;
        }
        if let Some(max_memory) = self.max_memory {
            options.max_memory = max_memory;
        }
        if let Some(ttl) = self.default_ttl {
            options.default_ttl = normalize_duration(Some(ttl));
        }
        if let Some(size_fn) = self.size_fn {
            options.size_fn = Some(size_fn);
        }
        if let Some(interval) = self.cleanup_interval {
            options.cleanup_interval = normalize_duration(Some(interval));
        }
    }
}

/// Zero durations mean "disabled".
pub(crate) fn normalize_duration(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unlimited() {
        let options: CacheOptions<String> = CacheOptions::default();
        assert_eq!(options.max_size, 0);
        assert_eq!(options.max_memory, 0);
        assert!(options.default_ttl.is_none());
        assert!(options.size_fn.is_none());
        assert!(options.cleanup_interval.is_none());
    }

    #[test]
    fn test_zero_durations_disable() {
        let options: CacheOptions<String> = CacheOptions::default()
            .with_default_ttl(Duration::ZERO)
            .with_cleanup_interval(Duration::ZERO);
        assert!(options.default_ttl.is_none());
        assert!(options.cleanup_interval.is_none());
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut options: CacheOptions<String> = CacheOptions::default()
            .with_max_size(10)
            .with_default_ttl(Duration::from_secs(5));

        CacheOptionsUpdate {
            max_memory: Some(1024),
            ..Default::default()
        }
        .apply_to(&mut options);

        assert_eq!(options.max_size, 10);
        assert_eq!(options.max_memory, 1024);
        assert_eq!(options.default_ttl, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_update_can_disable_ttl() {
        let mut options: CacheOptions<String> =
            CacheOptions::default().with_default_ttl(Duration::from_secs(5));

        CacheOptionsUpdate {
            default_ttl: Some(Duration::ZERO),
            ..Default::default()
        }
        .apply_to(&mut options);

        assert!(options.default_ttl.is_none());
    }
}
