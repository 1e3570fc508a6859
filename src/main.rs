//! Download Cache - command line downloader
//!
//! Downloads each URL argument through the scheduler and prints the final
//! status and cache statistics as JSON.
//!
//! Usage: `download_cache [PRIORITY=]URL...`

use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::json;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use download_cache::{
    Config, DownloadCache, DownloadRequest, DownloadScheduler, HttpTransport, Priority, SchedulerEvent,
};

/// Main entry point for the downloader.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the payload cache and HTTP transport
/// 4. Submit every URL argument to the scheduler
/// 5. Wait for all downloads, cancelling on SIGINT/SIGTERM
/// 6. Print status and cache statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "download_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let requests = parse_args(std::env::args().skip(1))?;

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_concurrent={}, timeout={}ms, max_retries={}, cache_max_entries={}",
        config.max_concurrent, config.default_timeout_ms, config.default_max_retries, config.cache_max_entries
    );

    let cache = DownloadCache::with_options(config.cache_options());
    let transport = HttpTransport::new().context("failed to build HTTP client")?;
    let scheduler = DownloadScheduler::with_store(config.scheduler_options(), transport, Arc::new(cache.clone()));

    let events = tokio::spawn(log_events(scheduler.subscribe()));

    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        handles.push(scheduler.add(request)?);
    }

    let wait_all = async {
        let mut failures = 0usize;
        for handle in handles {
            let id = handle.id().to_string();
            if let Err(err) = handle.wait().await {
                warn!(id = %id, error = %err, "Download did not complete");
                failures += 1;
            }
        }
        failures
    };

    let failures = tokio::select! {
        failures = wait_all => failures,
        _ = shutdown_signal() => {
            scheduler.cancel_all();
            warn!("Downloads cancelled");
            0
        }
    };

    let report = json!({
        "status": scheduler.status(),
        "cache": cache.stats(),
        "failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    cache.destroy();
    events.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Parses `[PRIORITY=]URL` arguments, using the URL as the task id.
fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<DownloadRequest>> {
    let mut requests = Vec::new();
    for arg in args {
        let (priority, url) = match arg.split_once('=') {
            Some((prefix, rest)) if !prefix.contains(':') && !prefix.contains('/') => {
                let priority: Priority = prefix.parse().map_err(anyhow::Error::msg)?;
                (priority, rest.to_string())
            }
            _ => (Priority::Normal, arg),
        };
        requests.push(DownloadRequest::new(url.clone(), url).with_priority(priority));
    }
    if requests.is_empty() {
        bail!("usage: download_cache [PRIORITY=]URL...");
    }
    Ok(requests)
}

/// Logs scheduler lifecycle events until the channel closes.
async fn log_events(mut events: tokio::sync::broadcast::Receiver<SchedulerEvent>) {
    loop {
        match events.recv().await {
            Ok(SchedulerEvent::Retrying { id, attempt, delay, error }) => {
                info!(id = %id, attempt, delay_ms = delay.as_millis() as u64, error = %error, "Retry scheduled");
            }
            Ok(SchedulerEvent::Succeeded { id, bytes }) => info!(id = %id, bytes, "Downloaded"),
            Ok(SchedulerEvent::Failed { id, error }) => warn!(id = %id, error = %error, "Failed"),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling downloads...");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling downloads...");
        }
    }
}
