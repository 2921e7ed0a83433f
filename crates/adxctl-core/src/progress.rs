//! Operation handles and polling for long-running management operations
//!
//! Mutating management calls return an [`Operation`] rather than a finished
//! resource. [`wait_for_completion`] drives the handle until it reaches a
//! terminal state, emitting [`ProgressEvent`]s along the way so a UI can show
//! what is happening.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::PollConfig;
use crate::error::{CoreError, Result};

/// Outcome of a single poll of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Still running; `retry_after` is the delay the service asked for
    Pending {
        status: String,
        retry_after: Option<Duration>,
    },
    /// Finished successfully with a result
    Succeeded(T),
    /// Finished in a failed or canceled state
    Failed(String),
}

/// Handle to a long-running operation on the remote service
#[async_trait]
pub trait Operation: Send {
    type Output: Send;

    /// Human readable description used in logs and progress events
    fn description(&self) -> &str;

    /// Query the service once for the current state of the operation
    async fn poll(&mut self) -> Result<PollStatus<Self::Output>>;
}

/// Boxed operation as returned by the management API
pub type BoxOperation<T> = Box<dyn Operation<Output = T>>;

/// Source of time for the poll loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Wall clock backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: sleeping advances time instantly and is recorded
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Total virtual time elapsed
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|o| *o).unwrap_or_default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += duration;
        }
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Progress events emitted while waiting on an operation
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Waiting has begun
    Started { operation: String },
    /// A poll returned a non-terminal status
    Polling {
        operation: String,
        status: String,
        elapsed: Duration,
    },
    /// A poll failed with a transient error and will be retried
    Retrying {
        operation: String,
        attempt: u32,
        error: String,
        backoff: Duration,
    },
    /// The operation succeeded
    Completed {
        operation: String,
        elapsed: Duration,
    },
    /// The operation failed
    Failed { operation: String, error: String },
}

/// Callback for progress updates
///
/// The CLI uses this to drive a spinner. Library callers can pass `None`.
pub type ProgressCallback<'a> = &'a (dyn Fn(ProgressEvent) + Send + Sync);

/// Timing policy for [`wait_for_completion`]
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub retry_enabled: bool,
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl PollPolicy {
    /// Delay before consecutive retry number `attempt` (1-based)
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
            retry_enabled: config.retry.enabled,
            max_retries: config.retry.max_attempts,
            backoff: Duration::from_millis(config.retry.backoff_ms),
            max_backoff: Duration::from_millis(config.retry.max_backoff_ms),
        }
    }
}

/// Poll an operation until it reaches a terminal state
///
/// # Arguments
///
/// * `operation` - The operation handle returned by a `begin_*` call
/// * `policy` - Interval, timeout and retry settings
/// * `clock` - Time source; [`TokioClock`] outside of tests
/// * `on_progress` - Optional callback for progress updates
///
/// # Returns
///
/// The operation's result, [`CoreError::OperationFailed`] if it ended in a
/// failed state, [`CoreError::OperationTimeout`] if it ran past the timeout,
/// or the poll error itself when polling fails and retry is off.
///
/// # Example
///
/// ```rust,ignore
/// use adxctl_core::progress::{wait_for_completion, PollPolicy, TokioClock};
///
/// let mut operation = api.begin_delete_database(rg, cluster, db).await?;
/// let outcome = wait_for_completion(
///     operation.as_mut(),
///     &PollPolicy::default(),
///     &TokioClock,
///     None,
/// )
/// .await?;
/// ```
pub async fn wait_for_completion<T, C>(
    operation: &mut dyn Operation<Output = T>,
    policy: &PollPolicy,
    clock: &C,
    on_progress: Option<ProgressCallback<'_>>,
) -> Result<T>
where
    T: Send,
    C: Clock + ?Sized,
{
    let start = clock.now();
    let name = operation.description().to_string();
    let mut consecutive_failures = 0u32;

    emit(
        on_progress,
        ProgressEvent::Started {
            operation: name.clone(),
        },
    );

    loop {
        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed > policy.timeout {
            emit(
                on_progress,
                ProgressEvent::Failed {
                    operation: name.clone(),
                    error: format!("timed out after {:?}", policy.timeout),
                },
            );
            return Err(CoreError::OperationTimeout(policy.timeout));
        }

        let status = match operation.poll().await {
            Ok(status) => {
                consecutive_failures = 0;
                status
            }
            Err(err)
                if policy.retry_enabled
                    && err.is_retryable()
                    && consecutive_failures < policy.max_retries =>
            {
                consecutive_failures += 1;
                let backoff = policy.retry_delay(consecutive_failures);
                tracing::debug!(
                    "Poll of '{}' failed (attempt {}), retrying in {:?}: {}",
                    name,
                    consecutive_failures,
                    backoff,
                    err
                );
                emit(
                    on_progress,
                    ProgressEvent::Retrying {
                        operation: name.clone(),
                        attempt: consecutive_failures,
                        error: err.to_string(),
                        backoff,
                    },
                );
                clock.sleep(backoff).await;
                continue;
            }
            Err(err) => {
                emit(
                    on_progress,
                    ProgressEvent::Failed {
                        operation: name.clone(),
                        error: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        match status {
            PollStatus::Succeeded(result) => {
                emit(
                    on_progress,
                    ProgressEvent::Completed {
                        operation: name.clone(),
                        elapsed: clock.now().saturating_duration_since(start),
                    },
                );
                return Ok(result);
            }
            PollStatus::Failed(error) => {
                emit(
                    on_progress,
                    ProgressEvent::Failed {
                        operation: name.clone(),
                        error: error.clone(),
                    },
                );
                return Err(CoreError::OperationFailed(error));
            }
            PollStatus::Pending {
                status,
                retry_after,
            } => {
                tracing::trace!("Operation '{}' is {}", name, status);
                emit(
                    on_progress,
                    ProgressEvent::Polling {
                        operation: name.clone(),
                        status,
                        elapsed,
                    },
                );
                clock.sleep(retry_after.unwrap_or(policy.interval)).await;
            }
        }
    }
}

fn emit(callback: Option<ProgressCallback<'_>>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
