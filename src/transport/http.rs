//! HTTP Transport
//!
//! reqwest-backed `Transport` that streams the response body chunk by chunk
//! so progress can be reported and cancellation observed mid-body.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{header, Client};
use tracing::{debug, trace};

use crate::error::{DownloadError, Result};
use crate::transport::{FetchRequest, FetchResponse, Transport};

/// Connection establishment timeout, independent of the per-attempt timeout.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest body buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

// == HTTP Transport ==
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a default reqwest client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a transport around a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse> {
        let timeout = request.timeout;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Non-success response");
            return Err(DownloadError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let total = response.content_length();

        let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(e, timeout))? {
            body.extend_from_slice(&chunk);
            if let Some(total) = total {
                request.report(body.len() as u64, total);
            }
        }
        trace!(url, bytes = body.len(), "Body received");

        Ok(FetchResponse {
            payload: body.freeze(),
            content_type,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, request: FetchRequest) -> Result<FetchResponse> {
        let timeout = request.timeout;
        let cancel = request.cancel.clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DownloadError::Aborted),
            result = tokio::time::timeout(timeout, self.download(url, &request)) => {
                result.unwrap_or(Err(DownloadError::Timeout(timeout)))
            }
        }
    }
}

/// Maps a reqwest failure onto the retry taxonomy.
fn classify(err: reqwest::Error, timeout: Duration) -> DownloadError {
    if err.is_timeout() {
        DownloadError::Timeout(timeout)
    } else {
        DownloadError::from(err)
    }
}
