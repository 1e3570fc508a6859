//! Scheduler Events Module
//!
//! Lifecycle notifications, per-task progress and the caller's handle.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::cache::Payload;
use crate::error::{DownloadError, Result};
use crate::scheduler::Priority;

/// Capacity of the lifecycle broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// == Progress ==
/// Bytes received for the current attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub loaded: u64,
    pub total: u64,
}

impl Progress {
    /// Completion ratio in `[0, 1]`, or `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.loaded as f64 / self.total as f64).min(1.0))
    }
}

// == Scheduler Event ==
/// Task lifecycle transitions, in the order the scheduler applies them.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Queued { id: String, priority: Priority },
    /// `attempt` is 1 for the first try
    Started { id: String, attempt: u32 },
    Succeeded { id: String, bytes: usize },
    /// `attempt` is the retry number about to be scheduled
    Retrying {
        id: String,
        attempt: u32,
        delay: Duration,
        error: DownloadError,
    },
    Failed { id: String, error: DownloadError },
    Cancelled { id: String },
}

impl SchedulerEvent {
    pub fn id(&self) -> &str {
        match self {
            SchedulerEvent::Queued { id, .. }
            | SchedulerEvent::Started { id, .. }
            | SchedulerEvent::Succeeded { id, .. }
            | SchedulerEvent::Retrying { id, .. }
            | SchedulerEvent::Failed { id, .. }
            | SchedulerEvent::Cancelled { id } => id,
        }
    }
}

// == Download Handle ==
/// Resolves once the task reaches a terminal state.
#[derive(Debug)]
pub struct DownloadHandle {
    id: String,
    result: oneshot::Receiver<Result<Payload>>,
    progress: watch::Receiver<Progress>,
}

impl DownloadHandle {
    pub(crate) fn new(
        id: String,
        result: oneshot::Receiver<Result<Payload>>,
        progress: watch::Receiver<Progress>,
    ) -> Self {
        Self { id, result, progress }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest progress sample and a receiver for further updates.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.clone()
    }

    /// Waits for the payload or the terminal error.
    ///
    /// A task dropped by the scheduler without an outcome reports `Aborted`.
    pub async fn wait(self) -> Result<Payload> {
        self.result.await.unwrap_or(Err(DownloadError::Aborted))
    }
}
