//! Resource models for the `Microsoft.Kusto` provider
//!
//! Only the fields the lifecycle reads or sends are modelled. Unknown fields
//! in responses are ignored.

use serde::{Deserialize, Serialize};

/// Compute SKU of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSku {
    pub name: String,
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    /// Runtime state, e.g. `Running`, `Creating`, `Stopped`
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub data_ingestion_uri: Option<String>,
}

/// A Kusto cluster as returned by the management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    pub location: String,
    #[serde(default)]
    pub sku: Option<AzureSku>,
    #[serde(default)]
    pub properties: ClusterProperties,
}

impl Cluster {
    pub fn summary(&self) -> ClusterSummary {
        ClusterSummary {
            name: self.name.clone(),
            state: self.properties.state.clone().unwrap_or_default(),
            location: self.location.clone(),
            instance_count: self.sku.as_ref().and_then(|s| s.capacity),
            uri: self.properties.uri.clone().unwrap_or_default(),
        }
    }
}

/// Desired attributes for a cluster create-or-update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    pub location: String,
    pub sku: AzureSku,
}

/// Database flavours; only read-write databases are managed here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    ReadWrite,
    ReadOnlyFollowing,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::ReadWrite => write!(f, "ReadWrite"),
            DatabaseKind::ReadOnlyFollowing => write!(f, "ReadOnlyFollowing"),
            DatabaseKind::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    /// ISO 8601 duration, e.g. `P365D`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_cache_period: Option<String>,
}

/// A database inside a Kusto cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub id: Option<String>,
    /// Fully qualified as `<cluster>/<database>`
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub kind: DatabaseKind,
    #[serde(default)]
    pub properties: DatabaseProperties,
}

impl Database {
    pub fn is_read_write(&self) -> bool {
        self.kind == DatabaseKind::ReadWrite
    }

    pub fn summary(&self) -> DatabaseSummary {
        DatabaseSummary {
            name: self.name.clone(),
            state: self.properties.provisioning_state.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            resource_type: self.resource_type.clone().unwrap_or_default(),
        }
    }
}

/// Desired attributes for a database create-or-update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSpec {
    pub kind: DatabaseKind,
    pub location: String,
    #[serde(skip_serializing_if = "DatabaseProperties::is_empty")]
    pub properties: DatabaseProperties,
}

impl DatabaseSpec {
    pub fn read_write(location: impl Into<String>) -> Self {
        Self {
            kind: DatabaseKind::ReadWrite,
            location: location.into(),
            properties: DatabaseProperties::default(),
        }
    }
}

impl DatabaseProperties {
    fn is_empty(&self) -> bool {
        self.provisioning_state.is_none()
            && self.soft_delete_period.is_none()
            && self.hot_cache_period.is_none()
    }
}

/// One row of the cluster report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub state: String,
    pub location: String,
    pub instance_count: Option<u32>,
    pub uri: String,
}

/// One row of the database report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub state: String,
    pub location: String,
    pub resource_type: String,
}

/// Final status of a completed deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub status_code: u16,
}

impl DeleteOutcome {
    /// The resource is gone: the service answered 200 OK or 204 No Content
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, 200 | 204)
    }
}
