use std::sync::Arc;

use adxctl_core::credential::credential_from_env;
use adxctl_core::{DemoConfig, KustoManagementClient, Lifecycle};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod error;
mod hooks;
mod output;

use cli::Cli;
use error::AdxCtlError;
use hooks::CliHooks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "adxctl=info,adxctl_core=info",
            1 => "adxctl=debug,adxctl_core=debug",
            _ => "adxctl=trace,adxctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose > 0)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn run(cli: &Cli) -> error::Result<()> {
    // Configuration and credentials are resolved before any remote call
    let mut config = DemoConfig::from_env()?;
    config
        .poll
        .apply_overrides(cli.poll_interval, cli.poll_timeout, cli.retry_attempts);
    let credential = credential_from_env()?;
    debug!("Configuration: {:?}", config);

    let client = KustoManagementClient::new(
        config.management_endpoint.clone(),
        config.subscription_id.clone(),
        Arc::from(credential),
    )
    .map_err(AdxCtlError::Client)?;

    let hooks = CliHooks::new(!cli.no_progress);
    let lifecycle = Lifecycle::new(&client, &config, &hooks);
    info!(
        "managing cluster {} and database {} in resource group {} ({})",
        lifecycle.cluster_name(),
        lifecycle.database_name(),
        config.resource_group,
        config.location
    );

    let report = lifecycle.run().await?;

    if report.has_delete_anomalies() {
        warn!("lifecycle finished, but a deletion reported an unexpected status");
    } else {
        info!("lifecycle finished");
    }
    Ok(())
}
