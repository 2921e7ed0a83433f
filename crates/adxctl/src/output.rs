//! Table rendering for listing results

use adxctl_core::kusto::{ClusterSummary, DatabaseSummary};
use comfy_table::Table;

/// Cluster listing as a table; an empty listing still has its header
pub fn cluster_table(clusters: &[ClusterSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "State", "Location", "Instance count", "URI"]);

    for cluster in clusters {
        table.add_row(vec![
            cluster.name.clone(),
            or_dash(&cluster.state),
            or_dash(&cluster.location),
            cluster
                .instance_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            or_dash(&cluster.uri),
        ]);
    }
    table
}

pub fn database_table(databases: &[DatabaseSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "State", "Location", "Type"]);

    for database in databases {
        table.add_row(vec![
            database.name.clone(),
            or_dash(&database.state),
            or_dash(&database.location),
            or_dash(&database.resource_type),
        ]);
    }
    table
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}
