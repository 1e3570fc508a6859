//! Configuration Module
//!
//! Loads scheduler and cache settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheOptions, Payload, DEFAULT_DOWNLOAD_MAX_ENTRIES, DEFAULT_DOWNLOAD_TTL};
use crate::scheduler::SchedulerOptions;

/// Runtime configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum downloads in flight at once
    pub max_concurrent: usize,
    /// Per-attempt timeout in milliseconds
    pub default_timeout_ms: u64,
    /// Retries per task before it is marked failed
    pub default_max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub retry_delay_ms: u64,
    /// Backoff multiplier between retries
    pub backoff_factor: f64,
    /// Maximum payloads kept in the download cache, 0 for unbounded
    pub cache_max_entries: usize,
    /// Maximum payload bytes kept in the download cache, 0 for unbounded
    pub cache_max_memory: usize,
    /// Payload lifetime in milliseconds, 0 for no expiry
    pub cache_ttl_ms: u64,
    /// Expired payload sweep interval in milliseconds, 0 to disable
    pub cleanup_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_CONCURRENT` - Concurrent downloads (default: 3)
    /// - `DEFAULT_TIMEOUT_MS` - Per-attempt timeout (default: 30000)
    /// - `DEFAULT_MAX_RETRIES` - Retry budget (default: 3)
    /// - `RETRY_DELAY_MS` - First retry delay (default: 1000)
    /// - `BACKOFF_FACTOR` - Retry delay multiplier (default: 2.0)
    /// - `CACHE_MAX_ENTRIES` - Cached payloads (default: 100)
    /// - `CACHE_MAX_MEMORY` - Cached payload bytes (default: 0)
    /// - `CACHE_TTL_MS` - Payload lifetime (default: 86400000)
    /// - `CLEANUP_INTERVAL_MS` - Expiry sweep cadence (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: env_or("MAX_CONCURRENT", defaults.max_concurrent),
            default_timeout_ms: env_or("DEFAULT_TIMEOUT_MS", defaults.default_timeout_ms),
            default_max_retries: env_or("DEFAULT_MAX_RETRIES", defaults.default_max_retries),
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms),
            backoff_factor: env_or("BACKOFF_FACTOR", defaults.backoff_factor),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_max_memory: env_or("CACHE_MAX_MEMORY", defaults.cache_max_memory),
            cache_ttl_ms: env_or("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cleanup_interval_ms: env_or("CLEANUP_INTERVAL_MS", defaults.cleanup_interval_ms),
        }
    }

    /// Scheduler options with out-of-range values clamped.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions::default()
            .with_max_concurrent(self.max_concurrent)
            .with_default_timeout(Duration::from_millis(self.default_timeout_ms))
            .with_default_max_retries(self.default_max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_backoff_factor(self.backoff_factor)
            .sanitized()
    }

    /// Download cache options. Zero durations disable the feature.
    pub fn cache_options(&self) -> CacheOptions<Payload> {
        CacheOptions::default()
            .with_max_size(self.cache_max_entries)
            .with_max_memory(self.cache_max_memory)
            .with_default_ttl(Duration::from_millis(self.cache_ttl_ms))
            .with_cleanup_interval(Duration::from_millis(self.cleanup_interval_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_timeout_ms: 30_000,
            default_max_retries: 3,
            retry_delay_ms: 1000,
            backoff_factor: 2.0,
            cache_max_entries: DEFAULT_DOWNLOAD_MAX_ENTRIES,
            cache_max_memory: 0,
            cache_ttl_ms: DEFAULT_DOWNLOAD_TTL.as_millis() as u64,
            cleanup_interval_ms: 60_000,
        }
    }
}

/// Parses `name`, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
