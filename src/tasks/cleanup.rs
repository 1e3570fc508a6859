//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::EvictionCache;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task holds only a weak reference: it exits on its own once every
/// handle to the cache has been dropped. The lock is taken for the sweep
/// alone and never held across the sleep.
///
/// # Arguments
/// * `cache` - Weak reference to the mutex-guarded cache
/// * `interval` - Time between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it when the cadence
/// changes or the cache is destroyed.
pub fn spawn_cleanup_task<K, V>(
    cache: Weak<Mutex<EvictionCache<K, V>>>,
    interval: Duration,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping TTL cleanup task");
                break;
            };
            let removed = cache.lock().cleanup();

            if removed > 0 {
                info!(removed, "TTL cleanup: removed expired entries");
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
