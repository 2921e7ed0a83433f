//! Kusto (Azure Data Explorer) management plane
//!
//! Models, the [`KustoApi`] trait the lifecycle is written against, and the
//! ARM-backed [`KustoManagementClient`].

pub mod api;
pub mod client;
pub mod models;

pub use api::KustoApi;
pub use client::{API_VERSION, KustoManagementClient};
pub use models::*;
