//! Unified error handling for adxctl-core
//!
//! Every failure the lifecycle can hit maps onto one [`CoreError`] variant:
//! synchronous rejections from the management API, transport problems, and
//! long-running operations that end in a failed state or never finish.
//!
//! # Example
//!
//! ```rust
//! use adxctl_core::CoreError;
//!
//! let err = CoreError::Api {
//!     status: 429,
//!     code: "TooManyRequests".to_string(),
//!     message: "slow down".to_string(),
//! };
//! assert!(err.is_rate_limited());
//! assert!(err.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Core error type for management operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// The management API rejected a request
    #[error("API error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced an HTTP response
    #[error("Connection error: {0}")]
    Connection(String),

    /// A token could not be acquired
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A long-running operation reached a failed or canceled state
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A long-running operation did not finish in time
    #[error("Operation timed out after {0:?}")]
    OperationTimeout(Duration),

    /// The service answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    fn status(&self) -> Option<u16> {
        match self {
            CoreError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CoreError::Authentication(_)) || matches!(self.status(), Some(401 | 403))
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::OperationTimeout(_)) || self.status() == Some(408)
    }

    /// Returns true if this is a rate limiting error (429)
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Returns true if this is a conflict/precondition error (409/412)
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(409 | 412))
    }

    /// Returns true if this is a bad request error (400)
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(400)
    }

    /// Returns true if repeating the same request might succeed
    ///
    /// Operation timeouts are not retryable here: the poll loop already
    /// spent its whole budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Connection(_) => true,
            CoreError::Api { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CoreError::InvalidResponse(err.to_string())
        } else {
            CoreError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidResponse(err.to_string())
    }
}
