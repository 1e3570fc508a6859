//! Shared Cache Module
//!
//! Thread-safe, cloneable handle around an `EvictionCache` that also owns the
//! optional background cleanup timer.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheOptions, CacheOptionsUpdate, CacheStats, EvictionCache};
use crate::tasks::spawn_cleanup_task;

// == Shared Cache ==
/// Cloneable handle to a mutex-guarded `EvictionCache`.
///
/// Every operation takes the lock once, so each call is atomic on its own.
/// Compound read-modify-write sequences should go through [`SharedCache::with`].
pub struct SharedCache<K, V> {
    cache: Arc<Mutex<EvictionCache<K, V>>>,
    cleanup: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            cleanup: Arc::clone(&self.cleanup),
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    // == Constructor ==
    /// Creates a shared cache, starting the cleanup timer if configured.
    ///
    /// The timer requires a running tokio runtime; without one the cache
    /// still works and expired entries are only dropped lazily.
    pub fn new(options: CacheOptions<V>) -> Self {
        let interval = options.cleanup_interval;
        let shared = Self {
            cache: Arc::new(Mutex::new(EvictionCache::new(options))),
            cleanup: Arc::new(Mutex::new(None)),
        };
        shared.restart_cleanup(interval);
        shared
    }

    // == Cache Operations ==
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.cache.lock().get(key).cloned()
    }

    pub fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.cache.lock().peek(key).cloned()
    }

    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        self.cache.lock().set(key, value, ttl);
    }

    pub fn has(&self, key: &K) -> bool {
        self.cache.lock().has(key)
    }

    pub fn delete(&self, key: &K) -> bool {
        self.cache.lock().delete(key)
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn keys(&self) -> Vec<K> {
        self.cache.lock().keys()
    }

    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.cache.lock().values()
    }

    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.cache.lock().entries()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.cache.lock().memory_usage()
    }

    pub fn cleanup(&self) -> usize {
        self.cache.lock().cleanup()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Runs `f` with exclusive access to the underlying cache.
    pub fn with<R>(&self, f: impl FnOnce(&mut EvictionCache<K, V>) -> R) -> R {
        f(&mut self.cache.lock())
    }

    // == Update Options ==
    /// Hot-swaps limits and, if given, the cleanup cadence.
    pub fn update_options(&self, update: CacheOptionsUpdate<V>) {
        let cadence_changed = update.cleanup_interval.is_some();
        let interval = {
            let mut cache = self.cache.lock();
            cache.update_options(update);
            cache.options().cleanup_interval
        };
        if cadence_changed {
            self.restart_cleanup(interval);
        }
    }

    // == Destroy ==
    /// Stops the cleanup timer and drops all entries. Safe to call repeatedly.
    pub fn destroy(&self) {
        if let Some(handle) = self.cleanup.lock().take() {
            handle.abort();
            debug!("Cache cleanup timer stopped");
        }
        self.cache.lock().destroy();
    }

    /// Returns true while a cleanup timer is scheduled.
    pub fn has_cleanup_timer(&self) -> bool {
        self.cleanup.lock().is_some()
    }

    fn restart_cleanup(&self, interval: Option<Duration>) {
        let mut slot = self.cleanup.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let Some(interval) = interval else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            *slot = Some(spawn_cleanup_task(Arc::downgrade(&self.cache), interval));
        } else {
            warn!(
                interval_ms = interval.as_millis() as u64,
                "No tokio runtime, cache cleanup timer disabled"
            );
        }
    }
}

impl<K, V> Default for SharedCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}
