//! Configuration for adxctl runs
//!
//! Everything is read from environment variables at process start. There is
//! no configuration file and no global state: callers build a [`DemoConfig`]
//! once and pass it down.

#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod resilience;

pub use config::{
    CLUSTER_NAME_SUFFIX, ClusterSku, DATABASE_NAME_SUFFIX, DEFAULT_MANAGEMENT_ENDPOINT, DemoConfig,
};
pub use error::{ConfigError, Result};
pub use resilience::{PollConfig, RetryConfig};
