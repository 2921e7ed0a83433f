//! Error types for configuration loading

use thiserror::Error;

/// Errors that can occur while building the run configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {name}{}", alternatives_hint(.alternatives))]
    MissingVar {
        name: String,
        alternatives: Vec<String>,
    },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("no Azure credential configured. {suggestion}")]
    NoCredential { suggestion: String },
}

impl ConfigError {
    /// Name of the environment variable this error is about, if any
    pub fn variable(&self) -> Option<&str> {
        match self {
            ConfigError::MissingVar { name, .. } | ConfigError::InvalidValue { name, .. } => {
                Some(name)
            }
            ConfigError::NoCredential { .. } => None,
        }
    }
}

fn alternatives_hint(alternatives: &[String]) -> String {
    if alternatives.is_empty() {
        String::new()
    } else {
        format!(" (or {})", alternatives.join(", "))
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
