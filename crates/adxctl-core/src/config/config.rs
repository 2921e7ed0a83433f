//! Run configuration built from the process environment
//!
//! Configuration is read once at startup into an immutable [`DemoConfig`]
//! which is then handed to the lifecycle workflow by reference.

use url::Url;

use super::error::{ConfigError, Result};
use super::resilience::PollConfig;

/// Suffix appended to `CLUSTER_NAME_PREFIX` to form the cluster name
pub const CLUSTER_NAME_SUFFIX: &str = "ADXTestCluster";
/// Suffix appended to `DATABASE_NAME_PREFIX` to form the database name
pub const DATABASE_NAME_SUFFIX: &str = "ADXTestDB";

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// A required variable and the alternative names accepted for it
struct RequiredVar {
    name: &'static str,
    alternatives: &'static [&'static str],
}

const SUBSCRIPTION: RequiredVar = RequiredVar {
    name: "SUBSCRIPTION",
    alternatives: &["AZURE_SUBSCRIPTION_ID"],
};
const RESOURCE_GROUP: RequiredVar = RequiredVar {
    name: "RESOURCE_GROUP",
    alternatives: &["AZURE_RESOURCE_GROUP"],
};
const LOCATION: RequiredVar = RequiredVar {
    name: "LOCATION",
    alternatives: &["AZURE_LOCATION"],
};
const CLUSTER_NAME_PREFIX: RequiredVar = RequiredVar {
    name: "CLUSTER_NAME_PREFIX",
    alternatives: &[],
};
const DATABASE_NAME_PREFIX: RequiredVar = RequiredVar {
    name: "DATABASE_NAME_PREFIX",
    alternatives: &[],
};

/// Compute SKU requested for the demo cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSku {
    pub name: String,
    pub tier: String,
    pub capacity: u32,
}

impl Default for ClusterSku {
    /// One instance, Basic tier, Dev(No SLA)_Standard_D11_v2 compute
    fn default() -> Self {
        Self {
            name: "Dev(No SLA)_Standard_D11_v2".to_string(),
            tier: "Basic".to_string(),
            capacity: 1,
        }
    }
}

/// Immutable configuration for one lifecycle run
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub cluster_name_prefix: String,
    pub database_name_prefix: String,
    pub cluster_sku: ClusterSku,
    pub management_endpoint: Url,
    pub poll: PollConfig,
}

impl DemoConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// Empty values are treated the same as unset ones. Required variables
    /// are checked in a fixed order and the first missing one is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let subscription_id = required(&get, &SUBSCRIPTION)?;
        let resource_group = required(&get, &RESOURCE_GROUP)?;
        let location = required(&get, &LOCATION)?;
        let cluster_name_prefix = required(&get, &CLUSTER_NAME_PREFIX)?;
        let database_name_prefix = required(&get, &DATABASE_NAME_PREFIX)?;

        let mut cluster_sku = ClusterSku::default();
        if let Some(name) = get("CLUSTER_SKU") {
            cluster_sku.name = name;
        }
        if let Some(tier) = get("CLUSTER_TIER") {
            cluster_sku.tier = tier;
        }
        if let Some(raw) = get("CLUSTER_CAPACITY") {
            cluster_sku.capacity = parse_number::<u32>("CLUSTER_CAPACITY", &raw)?;
            if cluster_sku.capacity == 0 {
                return Err(invalid("CLUSTER_CAPACITY", "must be at least 1"));
            }
        }

        let endpoint_raw = get("AZURE_RESOURCE_MANAGER_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_string());
        let management_endpoint = Url::parse(&endpoint_raw)
            .map_err(|e| invalid("AZURE_RESOURCE_MANAGER_ENDPOINT", &e.to_string()))?;

        let mut poll = PollConfig::default();
        let interval = get("POLL_INTERVAL_SECS")
            .map(|raw| parse_number::<u64>("POLL_INTERVAL_SECS", &raw))
            .transpose()?;
        if interval == Some(0) {
            return Err(invalid("POLL_INTERVAL_SECS", "must be at least 1"));
        }
        let timeout = get("POLL_TIMEOUT_SECS")
            .map(|raw| parse_number::<u64>("POLL_TIMEOUT_SECS", &raw))
            .transpose()?;
        let attempts = get("POLL_RETRY_ATTEMPTS")
            .map(|raw| parse_number::<u32>("POLL_RETRY_ATTEMPTS", &raw))
            .transpose()?;
        poll.apply_overrides(interval, timeout, attempts);

        Ok(Self {
            subscription_id,
            resource_group,
            location,
            cluster_name_prefix,
            database_name_prefix,
            cluster_sku,
            management_endpoint,
            poll,
        })
    }

    /// Name of the cluster managed by the demo
    pub fn cluster_name(&self) -> String {
        format!("{}{}", self.cluster_name_prefix, CLUSTER_NAME_SUFFIX)
    }

    /// Name of the database managed by the demo
    pub fn database_name(&self) -> String {
        format!("{}{}", self.database_name_prefix, DATABASE_NAME_SUFFIX)
    }
}

fn required<G>(get: &G, var: &RequiredVar) -> Result<String>
where
    G: Fn(&str) -> Option<String>,
{
    std::iter::once(var.name)
        .chain(var.alternatives.iter().copied())
        .find_map(get)
        .ok_or_else(|| ConfigError::MissingVar {
            name: var.name.to_string(),
            alternatives: var.alternatives.iter().map(|s| s.to_string()).collect(),
        })
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(name, &format!("'{}': {}", raw, e)))
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
