//! The management-plane surface used by the lifecycle workflow
//!
//! [`KustoApi`] is the seam between orchestration and transport. The real
//! implementation is [`KustoManagementClient`](super::KustoManagementClient);
//! tests substitute scripted in-memory versions.

use async_trait::async_trait;

use super::models::{Cluster, ClusterSpec, Database, DatabaseSpec, DeleteOutcome};
use crate::error::Result;
use crate::pager::Page;
use crate::progress::BoxOperation;

/// Cluster and database operations of the `Microsoft.Kusto` provider
///
/// `begin_*` calls return as soon as the service accepts the request. The
/// returned operation must be polled to a terminal state before the change
/// is considered done. A rejected request is an `Err` from `begin_*` itself.
#[async_trait]
pub trait KustoApi: Send + Sync {
    async fn begin_create_cluster(
        &self,
        resource_group: &str,
        cluster: &str,
        spec: &ClusterSpec,
    ) -> Result<BoxOperation<Cluster>>;

    /// Fetch one page of clusters in a resource group
    ///
    /// `next_link` is `None` for the first page.
    async fn list_clusters_page(
        &self,
        resource_group: &str,
        next_link: Option<String>,
    ) -> Result<Page<Cluster>>;

    async fn begin_delete_cluster(
        &self,
        resource_group: &str,
        cluster: &str,
    ) -> Result<BoxOperation<DeleteOutcome>>;

    async fn begin_create_database(
        &self,
        resource_group: &str,
        cluster: &str,
        database: &str,
        spec: &DatabaseSpec,
    ) -> Result<BoxOperation<Database>>;

    /// Fetch one page of databases in a cluster
    async fn list_databases_page(
        &self,
        resource_group: &str,
        cluster: &str,
        next_link: Option<String>,
    ) -> Result<Page<Database>>;

    async fn begin_delete_database(
        &self,
        resource_group: &str,
        cluster: &str,
        database: &str,
    ) -> Result<BoxOperation<DeleteOutcome>>;
}
