//! Command-line interface definition

use clap::Parser;

/// Azure Data Explorer cluster and database lifecycle demo
#[derive(Parser, Debug)]
#[command(name = "adxctl")]
#[command(
    version,
    about = "Create, list and delete an Azure Data Explorer cluster and database"
)]
#[command(long_about = "
Create, list and delete an Azure Data Explorer cluster and database

Runs one full lifecycle against Azure Resource Manager:
    1. create cluster <CLUSTER_NAME_PREFIX>ADXTestCluster and wait
    2. list clusters in the resource group
    3. create read-write database <DATABASE_NAME_PREFIX>ADXTestDB and wait
    4. list read-write databases in the cluster
    5. delete the database and wait
    6. delete the cluster and wait

The first failure stops the run. Resources created before it are left in place.

REQUIRED ENVIRONMENT:
    SUBSCRIPTION          (or AZURE_SUBSCRIPTION_ID)
    RESOURCE_GROUP        (or AZURE_RESOURCE_GROUP)
    LOCATION              (or AZURE_LOCATION)
    CLUSTER_NAME_PREFIX
    DATABASE_NAME_PREFIX

CREDENTIALS:
    AZURE_ACCESS_TOKEN, or
    AZURE_TENANT_ID + AZURE_CLIENT_ID + AZURE_CLIENT_SECRET

EXAMPLES:
    # Run with a token from the Azure CLI
    AZURE_ACCESS_TOKEN=$(az account get-access-token --query accessToken -o tsv) adxctl

    # Poll faster and give up after 20 minutes
    adxctl --poll-interval 5 --poll-timeout 1200

    # Retry transient poll failures, debug logging
    adxctl --retry-attempts 3 -v
")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Seconds between polls of a long-running operation
    #[arg(
        long,
        env = "ADXCTL_POLL_INTERVAL",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: Option<u64>,

    /// Give up waiting on an operation after this many seconds
    #[arg(long, env = "ADXCTL_POLL_TIMEOUT", value_name = "SECS")]
    pub poll_timeout: Option<u64>,

    /// Retry transient poll failures up to N times (0 disables retry)
    #[arg(long, env = "ADXCTL_RETRY_ATTEMPTS", value_name = "N")]
    pub retry_attempts: Option<u32>,

    /// Do not show a spinner while waiting
    #[arg(long, env = "ADXCTL_NO_PROGRESS")]
    pub no_progress: bool,
}
