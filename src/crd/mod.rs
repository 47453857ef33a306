//! Custom Resource Definitions for the Pinot Kubernetes Operator
//!
//! Defines the CRDs that the operator manages:
//! - Pinot: the cluster topology
//! - PinotSchema: a schema in the Pinot controller
//! - PinotTable: a table in the Pinot controller
//! - PinotTenant: a broker or server tenant in the Pinot controller

mod cluster;
mod resource_status;
mod schema;
mod table;
mod tenant;

pub use cluster::{
    AuthSecretRef, ClusterCondition, DeepStorageConfig, DeepStorageSpec, ExternalSpec,
    K8sConfigGroup, NodeSpec, NodeStatus, NodeType, Pinot, PinotNodeConfigGroup, PinotPhase,
    PinotSpec, PinotStatus, PodMetadata, StorageConfig, WorkloadKind, ZookeeperConfig,
    ZookeeperSpec,
};
pub use resource_status::LogicalResourceStatus;
pub use schema::{PinotSchema, PinotSchemaSpec};
pub use table::{PinotTable, PinotTableSpec, TableType};
pub use tenant::{PinotTenant, PinotTenantSpec, TenantType};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

/// All CRDs served by the operator, in install order.
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        Pinot::crd(),
        PinotSchema::crd(),
        PinotTable::crd(),
        PinotTenant::crd(),
    ]
}
