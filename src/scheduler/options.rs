//! Scheduler Options
//!
//! Concurrency, timeout and retry defaults for the download scheduler.

use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound on a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

// == Scheduler Options ==
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    /// Maximum attempts in flight at once
    pub max_concurrent: usize,
    /// Per-attempt timeout for tasks that do not set one
    pub default_timeout: Duration,
    /// Retry budget for tasks that do not set one
    pub default_max_retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    /// Multiplier applied to the delay on each further retry
    pub backoff_factor: f64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            default_timeout: DEFAULT_TIMEOUT,
            default_max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl SchedulerOptions {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Clamps values that would stall or shrink the schedule.
    ///
    /// `max_concurrent` is at least 1, a zero timeout falls back to the
    /// default, and the backoff factor is at least 1.0.
    pub fn sanitized(mut self) -> Self {
        self.max_concurrent = self.max_concurrent.max(1);
        if self.default_timeout.is_zero() {
            self.default_timeout = DEFAULT_TIMEOUT;
        }
        if !self.backoff_factor.is_finite() {
            self.backoff_factor = DEFAULT_BACKOFF_FACTOR;
        }
        self.backoff_factor = self.backoff_factor.max(1.0);
        self
    }

    /// Delay before retry number `retry` (1-based):
    /// `retry_delay * backoff_factor^(retry - 1)`, capped at `MAX_RETRY_DELAY`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.retry_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}
