//! Download Cache - prioritized downloads with retries and an LRU payload cache
//!
//! Provides a bounded-concurrency download scheduler with exponential-backoff
//! retries, plus a generic eviction cache with TTL, memory accounting and
//! hit/miss statistics.

pub mod cache;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod tasks;
pub mod transport;

pub use cache::{CacheOptions, CacheStats, DownloadCache, EvictionCache, Payload, RecencyList, SharedCache};
pub use config::Config;
pub use error::{DownloadError, Result};
pub use scheduler::{DownloadHandle, DownloadRequest, DownloadScheduler, Priority, SchedulerEvent, SchedulerOptions};
pub use tasks::spawn_cleanup_task;
pub use transport::{HttpTransport, Transport};
