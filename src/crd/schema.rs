//! PinotSchema Custom Resource Definition

use super::LogicalResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PinotSchema declares one schema in the Pinot controller
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "datainfra.io",
    version = "v1beta1",
    kind = "PinotSchema",
    namespaced,
    status = "LogicalResourceStatus",
    shortname = "pts",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.pinotCluster"}"#,
    printcolumn = r#"{"name":"Condition","type":"string","jsonPath":".status.type"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PinotSchemaSpec {
    /// Name of the owning Pinot cluster
    pub pinot_cluster: String,

    /// Schema document; `schemaName` is its identity in the controller
    #[serde(rename = "schema.json")]
    pub schema_json: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_spec_field_names() {
        let spec: PinotSchemaSpec = serde_json::from_str(
            r#"{"pinotCluster":"c1","schema.json":"{\"schemaName\":\"s1\"}"}"#,
        )
        .unwrap();
        assert_eq!(spec.pinot_cluster, "c1");
        assert!(spec.schema_json.contains("s1"));
    }
}
