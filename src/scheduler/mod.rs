//! Scheduler Module
//!
//! Priority download scheduling with bounded concurrency, per-attempt
//! timeouts and exponential-backoff retries.

mod engine;
mod events;
mod options;
mod queue;
mod store;
mod task;

pub use engine::{DownloadScheduler, SchedulerStatus};
pub use events::{DownloadHandle, Progress, SchedulerEvent, EVENT_CHANNEL_CAPACITY};
pub use options::{
    SchedulerOptions, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, MAX_RETRY_DELAY,
};
pub use queue::PendingQueue;
pub use store::PayloadStore;
pub use task::{DownloadRequest, DownloadTask, Priority};
