//! Download Task Module
//!
//! Task priorities, caller-facing requests and the scheduler's internal task
//! record.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::cache::Payload;
use crate::error::{DownloadError, Result};
use crate::scheduler::{DownloadHandle, Progress, SchedulerOptions};

// == Priority ==
/// Ordered priority, higher values are served first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Priority::Low),
            "normal" | "1" => Ok(Priority::Normal),
            "high" | "2" => Ok(Priority::High),
            "urgent" | "3" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

// == Download Request ==
/// What a caller submits. Unset limits take the scheduler defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Caller-assigned id, unique among outstanding tasks
    pub id: String,
    pub url: String,
    /// Informational name for the downloaded file
    pub filename: Option<String>,
    pub priority: Priority,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
}

impl DownloadRequest {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            filename: None,
            priority: Priority::Normal,
            max_retries: None,
            timeout: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// == Download Task ==
/// A submitted request with defaults applied and its completion channels.
#[derive(Debug)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub filename: Option<String>,
    pub priority: Priority,
    /// Retries consumed so far
    pub retry_count: u32,
    pub max_retries: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
    completion: Option<oneshot::Sender<Result<Payload>>>,
    progress: Arc<watch::Sender<Progress>>,
}

impl DownloadTask {
    /// Builds the task and the caller's handle for it.
    pub(crate) fn from_request(
        request: DownloadRequest,
        options: &SchedulerOptions,
    ) -> (Self, DownloadHandle) {
        let (completion_tx, completion_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = watch::channel(Progress::default());

        let timeout = request
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(options.default_timeout);

        let task = Self {
            id: request.id,
            url: request.url,
            filename: request.filename,
            priority: request.priority,
            retry_count: 0,
            max_retries: request.max_retries.unwrap_or(options.default_max_retries),
            timeout,
            completion: Some(completion_tx),
            progress: Arc::new(progress_tx),
        };
        let handle = DownloadHandle::new(task.id.clone(), completion_rx, progress_rx);
        (task, handle)
    }

    /// Returns a progress sink publishing to this task's handle.
    pub(crate) fn progress_sink(&self) -> crate::transport::ProgressFn {
        let progress = Arc::clone(&self.progress);
        Arc::new(move |loaded, total| {
            progress.send_replace(Progress { loaded, total });
        })
    }

    /// Resolves the caller's handle. Later calls are no-ops.
    pub(crate) fn complete(&mut self, outcome: Result<Payload>) {
        if let Some(completion) = self.completion.take() {
            // The caller may have dropped the handle
            let _ = completion.send(outcome);
        }
    }

    pub(crate) fn abort(&mut self) {
        self.complete(Err(DownloadError::Aborted));
    }
}
