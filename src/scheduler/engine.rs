//! Download Scheduler
//!
//! Admits tasks in priority order up to a concurrency limit, retries
//! retryable failures with exponential backoff and records outcomes.
//!
//! All registry mutations happen under one lock that is never held across an
//! await point. Admission runs on a spawned turn, so tasks submitted together
//! are admitted by priority rather than by submission order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{DownloadCache, Payload};
use crate::error::{DownloadError, Result};
use crate::scheduler::{
    DownloadHandle, DownloadRequest, DownloadTask, PayloadStore, PendingQueue, SchedulerEvent,
    SchedulerOptions, EVENT_CHANNEL_CAPACITY,
};
use crate::transport::{FetchRequest, FetchResponse, Transport};

// == Status ==
/// Snapshot of the scheduler registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub queued: usize,
    pub running: usize,
    /// Tasks sleeping before their next retry
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: bool,
}

// == Registries ==
/// Token owned by an in-flight attempt or a pending retry sleep.
#[derive(Debug)]
struct Slot {
    token: CancellationToken,
    generation: u64,
}

#[derive(Debug)]
struct FailedTask {
    task: DownloadTask,
    error: DownloadError,
}

#[derive(Debug, Default)]
struct State {
    pending: PendingQueue,
    running: HashMap<String, Slot>,
    retrying: HashMap<String, Slot>,
    failed: HashMap<String, FailedTask>,
    paused: bool,
    admission_scheduled: bool,
    generation: u64,
}

impl State {
    fn is_outstanding(&self, id: &str) -> bool {
        self.running.contains_key(id) || self.retrying.contains_key(id) || self.pending.contains(id)
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Frees the running slot if it still belongs to this attempt.
    fn release(&mut self, id: &str, generation: u64) {
        if self.running.get(id).is_some_and(|slot| slot.generation == generation) {
            self.running.remove(id);
        }
    }
}

struct Inner {
    options: SchedulerOptions,
    transport: Arc<dyn Transport>,
    store: Arc<dyn PayloadStore>,
    state: Mutex<State>,
    events: broadcast::Sender<SchedulerEvent>,
}

// == Download Scheduler ==
/// Cheaply cloneable handle to a shared scheduler.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct DownloadScheduler {
    inner: Arc<Inner>,
}

impl DownloadScheduler {
    /// Creates a scheduler storing completed payloads in a default `DownloadCache`.
    pub fn new(options: SchedulerOptions, transport: impl Transport + 'static) -> Self {
        Self::with_store(options, transport, Arc::new(DownloadCache::default()))
    }

    /// Creates a scheduler backed by the given payload store.
    pub fn with_store(
        options: SchedulerOptions,
        transport: impl Transport + 'static,
        store: Arc<dyn PayloadStore>,
    ) -> Self {
        let options = options.sanitized();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(
            max_concurrent = options.max_concurrent,
            max_retries = options.default_max_retries,
            "Download scheduler created"
        );
        Self {
            inner: Arc::new(Inner {
                options,
                transport: Arc::new(transport),
                store,
                state: Mutex::new(State::default()),
                events,
            }),
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.inner.options
    }

    /// Receives lifecycle events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    // == Submission ==
    /// Queues a download and returns a handle resolving to its outcome.
    ///
    /// Fails with `DuplicateTask` while a task with the same id is queued,
    /// running or waiting to retry. A previous failure record for the id is
    /// discarded.
    pub fn add(&self, request: DownloadRequest) -> Result<DownloadHandle> {
        let (task, handle) = DownloadTask::from_request(request, &self.inner.options);
        {
            let mut state = self.inner.state.lock();
            if state.is_outstanding(&task.id) {
                return Err(DownloadError::DuplicateTask(task.id));
            }
            state.failed.remove(&task.id);
            self.inner.enqueue(&mut state, task);
        }
        self.inner.schedule_admission();
        Ok(handle)
    }

    // == Cancellation ==
    /// Aborts a running attempt, drops a queued task or stops a pending retry.
    ///
    /// Unknown ids are ignored. An aborted running task is recorded as failed
    /// with `Aborted`.
    pub fn cancel(&self, id: &str) {
        let freed = {
            let mut state = self.inner.state.lock();
            let running = state.running.remove(id);
            if let Some(slot) = &running {
                slot.token.cancel();
            }
            if let Some(slot) = state.retrying.remove(id) {
                slot.token.cancel();
            }
            if let Some(mut task) = state.pending.remove(id) {
                task.abort();
                self.inner.emit(SchedulerEvent::Cancelled { id: task.id });
            }
            running.is_some()
        };
        debug!(id, freed, "Cancel requested");
        if freed {
            self.inner.schedule_admission();
        }
    }

    /// Cancels every running, queued and retrying task.
    pub fn cancel_all(&self) {
        let mut state = self.inner.state.lock();
        let running = state.running.len();
        for (_, slot) in state.running.drain() {
            slot.token.cancel();
        }
        for (_, slot) in state.retrying.drain() {
            slot.token.cancel();
        }
        let queued: Vec<DownloadTask> = state.pending.drain().collect();
        for mut task in queued {
            task.abort();
            self.inner.emit(SchedulerEvent::Cancelled { id: task.id });
        }
        info!(running, "All downloads cancelled");
    }

    // == Pause / Resume ==
    /// Stops admitting new attempts. In-flight attempts continue.
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
        info!("Download scheduler paused");
    }

    pub fn resume(&self) {
        self.inner.state.lock().paused = false;
        info!("Download scheduler resumed");
        self.inner.schedule_admission();
    }

    // == Queries ==
    pub fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock();
        SchedulerStatus {
            queued: state.pending.len(),
            running: state.running.len(),
            retrying: state.retrying.len(),
            completed: self.inner.store.count(),
            failed: state.failed.len(),
            paused: state.paused,
        }
    }

    /// Payload of a completed task, if still stored.
    pub fn get_completed(&self, id: &str) -> Option<Payload> {
        self.inner.store.load(id)
    }

    /// Terminal error of a failed task.
    pub fn get_error(&self, id: &str) -> Option<DownloadError> {
        self.inner
            .state
            .lock()
            .failed
            .get(id)
            .map(|failed| failed.error.clone())
    }

    // == Recovery ==
    /// Re-queues every failed task with a fresh retry budget.
    ///
    /// Returns the number of tasks re-queued. Their original handles have
    /// already resolved, so progress is observable through events only.
    pub fn retry_failed(&self) -> usize {
        let count = {
            let mut state = self.inner.state.lock();
            let failed: Vec<FailedTask> = state.failed.drain().map(|(_, failed)| failed).collect();
            let count = failed.len();
            for FailedTask { mut task, .. } in failed {
                task.retry_count = 0;
                self.inner.enqueue(&mut state, task);
            }
            count
        };
        info!(count, "Retrying failed downloads");
        if count > 0 {
            self.inner.schedule_admission();
        }
        count
    }

    /// Drops stored payloads and failure records.
    pub fn clear_cache(&self) {
        self.inner.store.clear();
        self.inner.state.lock().failed.clear();
        debug!("Scheduler results cleared");
    }
}

impl std::fmt::Debug for DownloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadScheduler")
            .field("options", &self.inner.options)
            .field("status", &self.status())
            .finish()
    }
}

// == Engine ==
impl Inner {
    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn enqueue(&self, state: &mut State, task: DownloadTask) {
        debug!(id = %task.id, priority = %task.priority, retry = task.retry_count, "Download queued");
        self.emit(SchedulerEvent::Queued {
            id: task.id.clone(),
            priority: task.priority,
        });
        state.pending.insert(task);
    }

    /// Runs admission on a later turn, coalescing repeated requests.
    fn schedule_admission(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.admission_scheduled {
                return;
            }
            state.admission_scheduled = true;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.admit() });
    }

    /// Starts queued tasks while slots are free and the scheduler is not paused.
    fn admit(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.admission_scheduled = false;

        while !state.paused && state.running.len() < self.options.max_concurrent {
            let Some(task) = state.pending.pop_front() else {
                break;
            };
            let generation = state.next_generation();
            let token = CancellationToken::new();
            state.running.insert(
                task.id.clone(),
                Slot {
                    token: token.clone(),
                    generation,
                },
            );

            let attempt = task.retry_count + 1;
            info!(id = %task.id, url = %task.url, attempt, "Download started");
            self.emit(SchedulerEvent::Started {
                id: task.id.clone(),
                attempt,
            });

            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run_attempt(task, token, generation).await });
        }
    }

    async fn run_attempt(self: Arc<Self>, task: DownloadTask, token: CancellationToken, generation: u64) {
        let request = FetchRequest::new(task.timeout)
            .with_cancel(token.clone())
            .with_progress(task.progress_sink());
        let timeout = task.timeout;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(DownloadError::Aborted),
            result = tokio::time::timeout(timeout, self.transport.fetch(&task.url, request)) => {
                result.unwrap_or(Err(DownloadError::Timeout(timeout)))
            }
        };

        self.finish_attempt(task, &token, generation, outcome);
    }

    fn finish_attempt(
        self: &Arc<Self>,
        mut task: DownloadTask,
        token: &CancellationToken,
        generation: u64,
        outcome: Result<FetchResponse>,
    ) {
        let retry = {
            let mut state = self.state.lock();
            state.release(&task.id, generation);

            match outcome {
                Ok(response) => {
                    let payload = Payload::new(response.payload, response.content_type);
                    info!(id = %task.id, bytes = payload.len(), "Download succeeded");
                    self.store.put(&task.id, payload.clone());
                    self.emit(SchedulerEvent::Succeeded {
                        id: task.id.clone(),
                        bytes: payload.len(),
                    });
                    task.complete(Ok(payload));
                    None
                }
                Err(error)
                    if error.is_retryable()
                        && task.retry_count < task.max_retries
                        && !token.is_cancelled() =>
                {
                    task.retry_count += 1;
                    let delay = self.options.backoff_delay(task.retry_count);
                    let generation = state.next_generation();
                    let wait = CancellationToken::new();
                    state.retrying.insert(
                        task.id.clone(),
                        Slot {
                            token: wait.clone(),
                            generation,
                        },
                    );
                    warn!(
                        id = %task.id,
                        retry = task.retry_count,
                        max_retries = task.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Download failed, retrying"
                    );
                    self.emit(SchedulerEvent::Retrying {
                        id: task.id.clone(),
                        attempt: task.retry_count,
                        delay,
                        error,
                    });
                    Some((task, delay, wait, generation))
                }
                Err(error) => {
                    self.fail(&mut state, task, error);
                    None
                }
            }
        };

        if let Some((task, delay, wait, generation)) = retry {
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.retry_after(task, delay, wait, generation).await });
        }
        self.admit();
    }

    /// Records a terminal failure and resolves the handle.
    ///
    /// Nothing is recorded while another task with the same id is outstanding.
    fn fail(&self, state: &mut State, mut task: DownloadTask, error: DownloadError) {
        if error == DownloadError::Aborted {
            info!(id = %task.id, "Download cancelled");
            self.emit(SchedulerEvent::Cancelled { id: task.id.clone() });
        } else {
            warn!(id = %task.id, retries = task.retry_count, error = %error, "Download failed");
            self.emit(SchedulerEvent::Failed {
                id: task.id.clone(),
                error: error.clone(),
            });
        }
        task.complete(Err(error.clone()));

        // A cancelled attempt whose id was resubmitted leaves no record
        if state.is_outstanding(&task.id) {
            debug!(id = %task.id, "Superseded attempt finished, not recorded");
            return;
        }
        state.failed.insert(task.id.clone(), FailedTask { task, error });
    }

    /// Sleeps out the backoff delay, then re-queues unless cancelled meanwhile.
    async fn retry_after(
        self: Arc<Self>,
        mut task: DownloadTask,
        delay: Duration,
        wait: CancellationToken,
        generation: u64,
    ) {
        tokio::select! {
            biased;
            _ = wait.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let mut state = self.state.lock();
                let current = state
                    .retrying
                    .get(&task.id)
                    .is_some_and(|slot| slot.generation == generation);
                if current {
                    state.retrying.remove(&task.id);
                    self.enqueue(&mut state, task);
                    drop(state);
                    self.schedule_admission();
                    return;
                }
            }
        }

        debug!(id = %task.id, "Retry cancelled");
        task.abort();
        self.emit(SchedulerEvent::Cancelled { id: task.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn fetch(&self, url: &str, _request: FetchRequest) -> Result<FetchResponse> {
            Ok(FetchResponse {
                payload: Bytes::copy_from_slice(url.as_bytes()),
                content_type: Some("text/plain".into()),
                status: 200,
            })
        }
    }

    struct FailingTransport(DownloadError);

    #[async_trait]
    impl Transport for FailingTransport {
        async fn fetch(&self, _url: &str, _request: FetchRequest) -> Result<FetchResponse> {
            Err(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_add_and_wait() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);

        let handle = scheduler.add(DownloadRequest::new("a", "http://test/a")).unwrap();
        let payload = handle.wait().await.unwrap();

        assert_eq!(&payload.bytes[..], b"http://test/a");
        assert_eq!(scheduler.get_completed("a"), Some(payload));
        assert_eq!(scheduler.status().completed, 1);
        assert_eq!(scheduler.status().running, 0);
    }

    #[tokio::test]
    async fn test_duplicate_outstanding_id_rejected() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);
        scheduler.pause();

        let _first = scheduler.add(DownloadRequest::new("a", "http://test/a")).unwrap();
        let second = scheduler.add(DownloadRequest::new("a", "http://test/other"));

        assert_eq!(second.unwrap_err(), DownloadError::DuplicateTask("a".into()));
        assert_eq!(scheduler.status().queued, 1);
    }

    #[tokio::test]
    async fn test_zero_retry_budget_fails_immediately() {
        let scheduler = DownloadScheduler::new(
            SchedulerOptions::default(),
            FailingTransport(DownloadError::Network("boom".into())),
        );

        let handle = scheduler
            .add(DownloadRequest::new("a", "http://test/a").with_max_retries(0))
            .unwrap();

        assert_eq!(handle.wait().await.unwrap_err(), DownloadError::Network("boom".into()));
        assert_eq!(scheduler.get_error("a"), Some(DownloadError::Network("boom".into())));
        assert_eq!(scheduler.status().failed, 1);
    }

    #[tokio::test]
    async fn test_aborted_error_is_not_retried() {
        let scheduler = DownloadScheduler::new(
            SchedulerOptions::default(),
            FailingTransport(DownloadError::Aborted),
        );
        let mut events = scheduler.subscribe();

        let handle = scheduler.add(DownloadRequest::new("a", "http://test/a")).unwrap();

        assert_eq!(handle.wait().await.unwrap_err(), DownloadError::Aborted);
        let mut saw_retry = false;
        while let Ok(event) = events.try_recv() {
            saw_retry |= matches!(event, SchedulerEvent::Retrying { .. });
        }
        assert!(!saw_retry);
    }

    #[tokio::test]
    async fn test_paused_scheduler_admits_nothing() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);
        scheduler.pause();

        let handle = scheduler.add(DownloadRequest::new("a", "http://test/a")).unwrap();
        tokio::task::yield_now().await;

        let status = scheduler.status();
        assert!(status.paused);
        assert_eq!(status.queued, 1);
        assert_eq!(status.running, 0);

        scheduler.resume();
        assert!(handle.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_queued_resolves_aborted() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);
        scheduler.pause();

        let handle = scheduler.add(DownloadRequest::new("a", "http://test/a")).unwrap();
        scheduler.cancel("a");

        assert_eq!(handle.wait().await.unwrap_err(), DownloadError::Aborted);
        assert_eq!(scheduler.status().queued, 0);
        assert_eq!(scheduler.status().failed, 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_ignored() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);
        scheduler.cancel("missing");
        assert_eq!(scheduler.status(), SchedulerStatus::default());
    }

    #[tokio::test]
    async fn test_clear_cache_drops_results() {
        let scheduler = DownloadScheduler::new(
            SchedulerOptions::default(),
            FailingTransport(DownloadError::http_status(404, "Not Found")),
        );

        let handle = scheduler
            .add(DownloadRequest::new("a", "http://test/a").with_max_retries(0))
            .unwrap();
        let _ = handle.wait().await;
        assert_eq!(scheduler.status().failed, 1);

        scheduler.clear_cache();

        assert_eq!(scheduler.status().failed, 0);
        assert!(scheduler.get_error("a").is_none());
    }

    #[tokio::test]
    async fn test_status_serializes_camel_case() {
        let scheduler = DownloadScheduler::new(SchedulerOptions::default(), EchoTransport);
        let json = serde_json::to_value(scheduler.status()).unwrap();

        assert_eq!(json["queued"], 0);
        assert_eq!(json["paused"], false);
        assert!(json.get("retrying").is_some());
    }
}
