//! Error types for the download scheduler
//!
//! Provides unified error handling using thiserror. Cache operations never
//! fail, so every variant here describes a download attempt or a rejected
//! submission.

use std::time::Duration;

use thiserror::Error;

// == Download Error Enum ==
/// Unified error type for download attempts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Connection-level failure (DNS, refused, reset, body read error)
    #[error("Network error: {0}")]
    Network(String),

    /// The attempt exceeded its timeout window
    #[error("Download timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("Download failed: HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The task was cancelled by the caller
    #[error("Download aborted")]
    Aborted,

    /// A task with the same id is already queued, running or waiting to retry
    #[error("Task already outstanding: {0}")]
    DuplicateTask(String),
}

impl DownloadError {
    // == Constructors ==
    /// Builds an `HttpStatus` error from a raw status code.
    pub fn http_status(status: u16, reason: impl Into<String>) -> Self {
        DownloadError::HttpStatus {
            status,
            reason: reason.into(),
        }
    }

    // == Retry Classification ==
    /// Returns true if another attempt may succeed.
    ///
    /// `Aborted` is terminal regardless of the remaining retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Network(_) | DownloadError::Timeout(_) | DownloadError::HttpStatus { .. }
        )
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            DownloadError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            )
        } else {
            DownloadError::Network(err.to_string())
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the download scheduler.
pub type Result<T> = std::result::Result<T, DownloadError>;
