//! Terminal presentation of a lifecycle run
//!
//! Logs each step through tracing, prints listing tables to stdout and drives
//! an indicatif spinner while an operation is being polled.

use std::sync::Mutex;
use std::time::Duration;

use adxctl_core::kusto::{Cluster, ClusterSummary, Database, DatabaseSummary, DeleteOutcome};
use adxctl_core::{LifecycleHooks, ProgressEvent, Step};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::output::{cluster_table, database_table};

pub struct CliHooks {
    show_progress: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliHooks {
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            spinner: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: String) {
        if !self.show_progress {
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
        {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(pb);
        }
    }

    fn update_spinner(&self, message: String) {
        if let Ok(slot) = self.spinner.lock()
            && let Some(pb) = slot.as_ref()
        {
            pb.set_message(message);
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(pb) = slot.take()
        {
            pb.finish_and_clear();
        }
    }
}

impl LifecycleHooks for CliHooks {
    fn on_step_start(&self, step: Step) {
        debug!("Starting {}", step);
    }

    fn on_progress(&self, _step: Step, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { operation } => {
                info!("waiting for {} to complete", operation);
                self.start_spinner(operation.clone());
            }
            ProgressEvent::Polling {
                operation,
                status,
                elapsed,
            } => {
                debug!("{}: {} after {:?}", operation, status, elapsed);
                self.update_spinner(format!("{}: {}", operation, format_state(status)));
            }
            ProgressEvent::Retrying {
                operation,
                attempt,
                error,
                backoff,
            } => {
                warn!(
                    "poll of {} failed (attempt {}), retrying in {:?}: {}",
                    operation, attempt, backoff, error
                );
            }
            ProgressEvent::Completed { operation, elapsed } => {
                self.stop_spinner();
                debug!("{} finished in {:?}", operation, elapsed);
            }
            ProgressEvent::Failed { operation, error } => {
                self.stop_spinner();
                debug!("{} failed: {}", operation, error);
            }
        }
    }

    fn on_cluster_created(&self, cluster: &Cluster) {
        info!(
            "created cluster {} ({})",
            cluster.name,
            cluster.properties.state.as_deref().unwrap_or("unknown state")
        );
    }

    fn on_clusters_listed(&self, clusters: &[ClusterSummary]) {
        info!("found {} cluster(s)", clusters.len());
        println!("{}", cluster_table(clusters));
    }

    fn on_database_created(&self, database: &Database) {
        info!(
            "created database {} with id {} and type {}",
            database.name,
            database.id.as_deref().unwrap_or("-"),
            database.resource_type.as_deref().unwrap_or("-")
        );
    }

    fn on_databases_listed(&self, databases: &[DatabaseSummary]) {
        info!("found {} read-write database(s)", databases.len());
        println!("{}", database_table(databases));
    }

    fn on_deleted(&self, step: Step, name: &str) {
        match step {
            Step::DeleteDatabase => info!("deleted database {}", name),
            _ => info!("deleted cluster {}", name),
        }
    }

    fn on_delete_anomaly(&self, step: Step, name: &str, outcome: &DeleteOutcome) {
        warn!(
            "{} of {} finished with unexpected status {}; continuing",
            step, name, outcome.status_code
        );
    }
}

/// Status text with an icon, like the poll states shown by the service
fn format_state(state: &str) -> String {
    match state.to_lowercase().as_str() {
        "succeeded" => format!("✓ {}", state),
        "failed" | "canceled" => format!("✗ {}", state),
        "creating" | "deleting" | "running" | "inprogress" | "updating" => format!("⏳ {}", state),
        _ => state.to_string(),
    }
}
