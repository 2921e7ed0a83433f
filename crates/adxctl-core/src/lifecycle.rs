//! Cluster and database lifecycle workflow
//!
//! Drives one full cycle against the management plane:
//!
//! 1. create the cluster and wait for it
//! 2. list clusters in the resource group
//! 3. create a read-write database in the cluster and wait for it
//! 4. list read-write databases in the cluster
//! 5. delete the database and wait
//! 6. delete the cluster and wait
//!
//! Steps run strictly in order. The first error stops the run and is returned
//! as a [`StepError`] naming the step; nothing is rolled back. Presentation is
//! left to a [`LifecycleHooks`] implementation.

use futures::TryStreamExt;
use futures::stream::BoxStream;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DemoConfig;
use crate::error::{CoreError, Result};
use crate::kusto::{
    AzureSku, Cluster, ClusterSpec, ClusterSummary, Database, DatabaseSpec, DatabaseSummary,
    DeleteOutcome, KustoApi,
};
use crate::pager::paginate;
use crate::progress::{
    BoxOperation, Clock, PollPolicy, ProgressCallback, ProgressEvent, TokioClock,
    wait_for_completion,
};

/// The steps of a lifecycle run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateCluster,
    ListClusters,
    CreateDatabase,
    ListDatabases,
    DeleteDatabase,
    DeleteCluster,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::CreateCluster,
        Step::ListClusters,
        Step::CreateDatabase,
        Step::ListDatabases,
        Step::DeleteDatabase,
        Step::DeleteCluster,
    ];
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::CreateCluster => "cluster creation",
            Step::ListClusters => "cluster listing",
            Step::CreateDatabase => "database creation",
            Step::ListDatabases => "database listing",
            Step::DeleteDatabase => "database deletion",
            Step::DeleteCluster => "cluster deletion",
        };
        f.write_str(name)
    }
}

/// A failure, tagged with the step it happened in
#[derive(Error, Debug)]
#[error("{step} failed: {source}")]
pub struct StepError {
    pub step: Step,
    #[source]
    pub source: CoreError,
}

/// Presentation hooks called by [`Lifecycle`]
///
/// All methods default to doing nothing.
pub trait LifecycleHooks: Send + Sync {
    fn on_step_start(&self, _step: Step) {}
    fn on_step_complete(&self, _step: Step) {}
    fn on_progress(&self, _step: Step, _event: &ProgressEvent) {}
    fn on_cluster_created(&self, _cluster: &Cluster) {}
    fn on_clusters_listed(&self, _clusters: &[ClusterSummary]) {}
    fn on_database_created(&self, _database: &Database) {}
    fn on_databases_listed(&self, _databases: &[DatabaseSummary]) {}
    fn on_deleted(&self, _step: Step, _name: &str) {}
    /// A deletion finished without error but with a non-success status
    fn on_delete_anomaly(&self, _step: Step, _name: &str, _outcome: &DeleteOutcome) {}
}

/// Hooks that ignore every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}

/// Everything a completed run observed
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub cluster: Cluster,
    pub clusters: Vec<ClusterSummary>,
    pub database: Database,
    pub databases: Vec<DatabaseSummary>,
    pub database_deletion: DeleteOutcome,
    pub cluster_deletion: DeleteOutcome,
}

impl LifecycleReport {
    /// True if either deletion reported a non-success status
    pub fn has_delete_anomalies(&self) -> bool {
        !self.database_deletion.is_success() || !self.cluster_deletion.is_success()
    }
}

/// Submit a mutating request and block until its operation is terminal
///
/// Works the same for every resource kind: `begin` is any `begin_*` call on
/// a [`KustoApi`]. A synchronous rejection is returned as-is; otherwise the
/// operation is driven by [`wait_for_completion`].
pub async fn submit_and_wait<T, C, B>(
    begin: B,
    policy: &PollPolicy,
    clock: &C,
    on_progress: Option<ProgressCallback<'_>>,
) -> Result<T>
where
    T: Send + 'static,
    C: Clock + ?Sized,
    B: Future<Output = Result<BoxOperation<T>>>,
{
    let mut operation = begin.await?;
    wait_for_completion(operation.as_mut(), policy, clock, on_progress).await
}

/// All clusters in a resource group, fetched lazily page by page
pub fn list_clusters<'a>(
    api: &'a dyn KustoApi,
    resource_group: &'a str,
) -> BoxStream<'a, Result<Cluster>> {
    paginate(move |next_link| api.list_clusters_page(resource_group, next_link))
}

/// Read-write databases of a cluster; other kinds are skipped
pub fn list_read_write_databases<'a>(
    api: &'a dyn KustoApi,
    resource_group: &'a str,
    cluster: &'a str,
) -> BoxStream<'a, Result<Database>> {
    Box::pin(
        paginate(move |next_link| api.list_databases_page(resource_group, cluster, next_link))
            .try_filter(|db| futures::future::ready(db.is_read_write())),
    )
}

/// The lifecycle workflow bound to one configuration
pub struct Lifecycle<'a, C: Clock = TokioClock> {
    api: &'a dyn KustoApi,
    config: &'a DemoConfig,
    hooks: &'a dyn LifecycleHooks,
    policy: PollPolicy,
    clock: C,
    cluster_name: String,
    database_name: String,
}

impl<'a> Lifecycle<'a, TokioClock> {
    pub fn new(
        api: &'a dyn KustoApi,
        config: &'a DemoConfig,
        hooks: &'a dyn LifecycleHooks,
    ) -> Self {
        Self {
            api,
            config,
            hooks,
            policy: PollPolicy::from(&config.poll),
            clock: TokioClock,
            cluster_name: config.cluster_name(),
            database_name: config.database_name(),
        }
    }
}

impl<'a, C: Clock> Lifecycle<'a, C> {
    /// Replace the time source, e.g. with a `ManualClock` in tests
    pub fn with_clock<D: Clock>(self, clock: D) -> Lifecycle<'a, D> {
        Lifecycle {
            api: self.api,
            config: self.config,
            hooks: self.hooks,
            policy: self.policy,
            clock,
            cluster_name: self.cluster_name,
            database_name: self.database_name,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Run all six steps in order, stopping at the first failure
    pub async fn run(&self) -> std::result::Result<LifecycleReport, StepError> {
        let cluster = self.create_cluster().await?;
        let clusters = self.list_clusters().await?;
        let database = self.create_database().await?;
        let databases = self.list_databases().await?;
        let database_deletion = self.delete_database().await?;
        let cluster_deletion = self.delete_cluster().await?;

        Ok(LifecycleReport {
            cluster,
            clusters,
            database,
            databases,
            database_deletion,
            cluster_deletion,
        })
    }

    pub async fn create_cluster(&self) -> std::result::Result<Cluster, StepError> {
        let step = Step::CreateCluster;
        let sku = &self.config.cluster_sku;
        let spec = ClusterSpec {
            location: self.config.location.clone(),
            sku: AzureSku {
                name: sku.name.clone(),
                tier: sku.tier.clone(),
                capacity: Some(sku.capacity),
            },
        };

        let cluster = self
            .step(step, async {
                let progress = |event: ProgressEvent| self.hooks.on_progress(step, &event);
                submit_and_wait(
                    self.api.begin_create_cluster(
                        &self.config.resource_group,
                        &self.cluster_name,
                        &spec,
                    ),
                    &self.policy,
                    &self.clock,
                    Some(&progress),
                )
                .await
            })
            .await?;
        self.hooks.on_cluster_created(&cluster);
        Ok(cluster)
    }

    pub async fn list_clusters(&self) -> std::result::Result<Vec<ClusterSummary>, StepError> {
        let summaries: Vec<ClusterSummary> = self
            .step(Step::ListClusters, async {
                list_clusters(self.api, &self.config.resource_group)
                    .map_ok(|cluster| cluster.summary())
                    .try_collect()
                    .await
            })
            .await?;
        self.hooks.on_clusters_listed(&summaries);
        Ok(summaries)
    }

    pub async fn create_database(&self) -> std::result::Result<Database, StepError> {
        let step = Step::CreateDatabase;
        let spec = DatabaseSpec::read_write(self.config.location.clone());

        let database = self
            .step(step, async {
                let progress = |event: ProgressEvent| self.hooks.on_progress(step, &event);
                submit_and_wait(
                    self.api.begin_create_database(
                        &self.config.resource_group,
                        &self.cluster_name,
                        &self.database_name,
                        &spec,
                    ),
                    &self.policy,
                    &self.clock,
                    Some(&progress),
                )
                .await
            })
            .await?;
        self.hooks.on_database_created(&database);
        Ok(database)
    }

    pub async fn list_databases(&self) -> std::result::Result<Vec<DatabaseSummary>, StepError> {
        let summaries: Vec<DatabaseSummary> = self
            .step(Step::ListDatabases, async {
                list_read_write_databases(
                    self.api,
                    &self.config.resource_group,
                    &self.cluster_name,
                )
                .map_ok(|database| database.summary())
                .try_collect()
                .await
            })
            .await?;
        self.hooks.on_databases_listed(&summaries);
        Ok(summaries)
    }

    pub async fn delete_database(&self) -> std::result::Result<DeleteOutcome, StepError> {
        let step = Step::DeleteDatabase;
        let outcome = self
            .step(step, async {
                let progress = |event: ProgressEvent| self.hooks.on_progress(step, &event);
                submit_and_wait(
                    self.api.begin_delete_database(
                        &self.config.resource_group,
                        &self.cluster_name,
                        &self.database_name,
                    ),
                    &self.policy,
                    &self.clock,
                    Some(&progress),
                )
                .await
            })
            .await?;
        self.report_deletion(step, &self.database_name, &outcome);
        Ok(outcome)
    }

    pub async fn delete_cluster(&self) -> std::result::Result<DeleteOutcome, StepError> {
        let step = Step::DeleteCluster;
        let outcome = self
            .step(step, async {
                let progress = |event: ProgressEvent| self.hooks.on_progress(step, &event);
                submit_and_wait(
                    self.api
                        .begin_delete_cluster(&self.config.resource_group, &self.cluster_name),
                    &self.policy,
                    &self.clock,
                    Some(&progress),
                )
                .await
            })
            .await?;
        self.report_deletion(step, &self.cluster_name, &outcome);
        Ok(outcome)
    }

    /// Wrap one step with start/complete hooks and tag its error
    async fn step<T, F>(&self, step: Step, work: F) -> std::result::Result<T, StepError>
    where
        F: Future<Output = Result<T>>,
    {
        debug!("Starting {}", step);
        self.hooks.on_step_start(step);
        let value = work.await.map_err(|source| StepError { step, source })?;
        self.hooks.on_step_complete(step);
        Ok(value)
    }

    // Non-success deletion status is reported, not fatal: the operation
    // itself completed without error.
    fn report_deletion(&self, step: Step, name: &str, outcome: &DeleteOutcome) {
        if outcome.is_success() {
            self.hooks.on_deleted(step, name);
        } else {
            warn!(
                "{} of {} completed with status {}",
                step, name, outcome.status_code
            );
            self.hooks.on_delete_anomaly(step, name, outcome);
        }
    }
}
