//! # adxctl-core
//!
//! Engine layer for managing Azure Data Explorer (Kusto) clusters and
//! databases through Azure Resource Manager.
//!
//! ## Layout
//!
//! - **[config]** - run configuration loaded from environment variables
//! - **[credential]** - bearer tokens for the management API
//! - **[kusto]** - resource models, the [`KustoApi`] seam and its HTTP client
//! - **[progress]** - long-running operation handles and the poll loop
//! - **[pager]** - lazy streams over paged list responses
//! - **[lifecycle]** - the create/list/delete workflow built on the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use adxctl_core::{DemoConfig, KustoManagementClient, Lifecycle, NoopHooks};
//! use adxctl_core::credential::credential_from_env;
//!
//! let config = DemoConfig::from_env()?;
//! let credential = credential_from_env()?;
//! let client = KustoManagementClient::new(
//!     config.management_endpoint.clone(),
//!     config.subscription_id.clone(),
//!     credential.into(),
//! )?;
//! let report = Lifecycle::new(&client, &config, &NoopHooks).run().await?;
//! println!("{} clusters seen", report.clusters.len());
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod kusto;
pub mod lifecycle;
pub mod pager;
pub mod progress;

pub use config::{ConfigError, DemoConfig, PollConfig, RetryConfig};
pub use error::{CoreError, Result};
pub use kusto::{KustoApi, KustoManagementClient};
pub use lifecycle::{
    Lifecycle, LifecycleHooks, LifecycleReport, NoopHooks, Step, StepError,
    list_clusters, list_read_write_databases, submit_and_wait,
};
pub use progress::{
    Clock, ManualClock, PollPolicy, PollStatus, ProgressEvent, TokioClock, wait_for_completion,
};
