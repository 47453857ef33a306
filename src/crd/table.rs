//! PinotTable Custom Resource Definition

use super::LogicalResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PinotTable declares one table in the Pinot controller
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "datainfra.io",
    version = "v1beta1",
    kind = "PinotTable",
    namespaced,
    status = "LogicalResourceStatus",
    shortname = "ptt",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.pinotCluster"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.pinotTableType"}"#,
    printcolumn = r#"{"name":"Condition","type":"string","jsonPath":".status.type"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PinotTableSpec {
    /// Name of the owning Pinot cluster
    pub pinot_cluster: String,

    /// Realtime or offline
    #[serde(default)]
    pub pinot_table_type: TableType,

    /// Reload all segments when the table's schema is updated
    #[serde(default)]
    pub segment_reload: bool,

    /// Table config document; `tableName` is its identity in the controller
    #[serde(rename = "tables.json")]
    pub tables_json: String,
}

/// Pinot table type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Realtime,
    #[default]
    Offline,
}

impl TableType {
    /// Value of the `type` query parameter
    pub fn query_value(&self) -> &'static str {
        match self {
            TableType::Realtime => "realtime",
            TableType::Offline => "offline",
        }
    }

    /// Key of this table type in a `GET /tables/{name}` response
    pub fn response_key(&self) -> &'static str {
        match self {
            TableType::Realtime => "REALTIME",
            TableType::Offline => "OFFLINE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_spec_defaults() {
        let spec: PinotTableSpec = serde_json::from_str(
            r#"{"pinotCluster":"c1","tables.json":"{\"tableName\":\"t1\"}"}"#,
        )
        .unwrap();
        assert_eq!(spec.pinot_table_type, TableType::Offline);
        assert!(!spec.segment_reload);
    }

    #[test]
    fn test_table_type_keys() {
        assert_eq!(TableType::Realtime.query_value(), "realtime");
        assert_eq!(TableType::Offline.response_key(), "OFFLINE");
    }
}
