//! Status shared by the schema, table and tenant resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observed state of a logical resource in the Pinot controller
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogicalResourceStatus {
    /// Condition type of the last outcome (e.g. `CreateSuccess`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Condition status (True, False)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Raw controller response or error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// RFC 3339 timestamp of the last status change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,

    /// Last JSON document successfully applied to (or adopted from) the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied_json: Option<String>,

    /// Segment reload responses (tables only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reload_status: Vec<String>,
}
