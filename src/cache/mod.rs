//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction, plus a
//! value-less recency list.

mod download;
mod entry;
mod options;
mod order;
mod recency;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use download::{DownloadCache, Payload, DEFAULT_DOWNLOAD_MAX_ENTRIES, DEFAULT_DOWNLOAD_TTL};
pub use entry::CacheEntry;
pub use options::{CacheOptions, CacheOptionsUpdate, SizeFn};
pub use recency::RecencyList;
pub use shared::SharedCache;
pub use stats::{CacheCounters, CacheStats};
pub use store::EvictionCache;
