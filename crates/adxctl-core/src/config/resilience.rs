//! Polling and retry configuration for long-running operations
//!
//! The default is fail-fast: any error while polling an operation aborts the
//! wait. Retry with exponential backoff is opt-in.

use std::time::Duration;

/// How long-running operations are polled
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay between polls when the service does not send `Retry-After`
    pub interval_secs: u64,

    /// Maximum time to wait for a single operation
    pub timeout_secs: u64,

    /// Retry configuration for transient poll failures
    pub retry: RetryConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 1800,
            retry: RetryConfig::default(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply command-line overrides on top of environment-derived values
    pub fn apply_overrides(
        &mut self,
        interval_secs: Option<u64>,
        timeout_secs: Option<u64>,
        retry_attempts: Option<u32>,
    ) {
        if let Some(interval) = interval_secs {
            self.interval_secs = interval;
        }
        if let Some(timeout) = timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(attempts) = retry_attempts {
            self.retry.max_attempts = attempts;
            self.retry.enabled = attempts > 0;
        }
    }
}

/// Retry configuration for poll requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Whether retry is enabled
    pub enabled: bool,

    /// Maximum number of consecutive retries of a failed poll
    pub max_attempts: u32,

    /// Initial backoff in milliseconds
    pub backoff_ms: u64,

    /// Maximum backoff in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}
