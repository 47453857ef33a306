//! PinotTenant Custom Resource Definition

use super::LogicalResourceStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PinotTenant declares one broker or server tenant in the Pinot controller
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "datainfra.io",
    version = "v1beta1",
    kind = "PinotTenant",
    namespaced,
    status = "LogicalResourceStatus",
    shortname = "ptn",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.pinotCluster"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.pinotTenantType"}"#,
    printcolumn = r#"{"name":"Condition","type":"string","jsonPath":".status.type"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PinotTenantSpec {
    /// Name of the owning Pinot cluster
    pub pinot_cluster: String,

    /// Broker or server tenant
    pub pinot_tenant_type: TenantType,

    /// Tenant document; `tenantName` is its identity in the controller
    #[serde(rename = "tenants.json")]
    pub tenants_json: String,
}

/// Pinot tenant role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Broker,
    Server,
}

impl TenantType {
    /// Value of the `type` query parameter on delete
    pub fn query_value(&self) -> &'static str {
        match self {
            TenantType::Broker => "BROKER",
            TenantType::Server => "SERVER",
        }
    }

    /// Key listing tenants of this role in a `GET /tenants` response
    pub fn listing_key(&self) -> &'static str {
        match self {
            TenantType::Broker => "BROKER_TENANTS",
            TenantType::Server => "SERVER_TENANTS",
        }
    }
}
