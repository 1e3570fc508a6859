//! Transport Module
//!
//! The fetch collaborator consumed by the download scheduler: a cancellable,
//! progress-reporting GET returning a byte payload.

mod http;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use http::HttpTransport;

/// Receives `(loaded, total)` byte counts while a body is being read.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

// == Fetch Request ==
/// Per-attempt parameters handed to a transport.
#[derive(Clone)]
pub struct FetchRequest {
    /// Upper bound for this attempt
    pub timeout: Duration,
    /// Progress sink, called only when the total length is known
    pub progress: Option<ProgressFn>,
    /// Cancelled when the caller aborts the task
    pub cancel: CancellationToken,
}

impl FetchRequest {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forwards a progress sample if a sink is attached.
    pub fn report(&self, loaded: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress(loaded, total);
        }
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("timeout", &self.timeout)
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// == Fetch Response ==
/// A successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub payload: Bytes,
    pub content_type: Option<String>,
    pub status: u16,
}

// == Transport Trait ==
/// Issues GET requests on behalf of the scheduler.
///
/// Implementations must return `DownloadError::Aborted` promptly once
/// `request.cancel` fires, map non-2xx responses to `HttpStatus`, and
/// report progress through `request.report` when the length is known.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse> {
        (**self).fetch(url, request).await
    }
}
