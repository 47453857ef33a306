//! Pinot Custom Resource Definition
//!
//! Describes the topology of an Apache Pinot cluster: which node types to run,
//! in what order, and which Kubernetes and Pinot configuration groups each
//! node uses.

use k8s_openapi::api::core::v1::{
    ContainerPort, EnvVar, PersistentVolumeClaimSpec, Probe, ResourceRequirements, ServiceSpec,
    Toleration, Volume, VolumeMount,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pinot is the Schema for the pinots API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "datainfra.io",
    version = "v1beta1",
    kind = "Pinot",
    namespaced,
    status = "PinotStatus",
    shortname = "pt",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PinotSpec {
    /// Order in which node types are rolled out
    pub deployment_order: Vec<NodeType>,

    /// External dependencies (zookeeper, deep storage)
    #[serde(default)]
    pub external: ExternalSpec,

    /// Kubernetes configuration groups referenced by nodes
    #[serde(default)]
    pub k8s_config_groups: Vec<K8sConfigGroup>,

    /// Pinot configuration groups referenced by nodes
    #[serde(default)]
    pub pinot_node_config_groups: Vec<PinotNodeConfigGroup>,

    /// Node declarations
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Plugins to include on every node's classpath
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Secret holding controller basic-auth credentials
    #[serde(default)]
    pub auth: Option<AuthSecretRef>,
}

/// Pinot node roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Cluster management and admin API
    Controller,
    /// Query routing
    Broker,
    /// Segment storage and query execution
    Server,
    /// Background tasks
    Minion,
}

impl NodeType {
    /// Lowercase name used in labels and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Controller => "controller",
            NodeType::Broker => "broker",
            NodeType::Server => "server",
            NodeType::Minion => "minion",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workload kind used for a node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum WorkloadKind {
    /// Stateful set with stable identity and volume claim templates
    #[default]
    #[serde(alias = "StatefulSet")]
    Statefulset,
    /// Stateless deployment
    Deployment,
}

/// One group of replicas of a single node type
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Node name, used as the prefix of every derived object
    pub name: String,

    /// Workload kind
    #[serde(default)]
    pub kind: WorkloadKind,

    /// Pinot role
    pub node_type: NodeType,

    /// Replica count
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Name of the K8sConfigGroup to use
    pub k8s_config: String,

    /// Name of the PinotNodeConfigGroup to use
    pub pinot_node_config: String,
}

/// Kubernetes-level settings shared by any number of nodes
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct K8sConfigGroup {
    /// Group name
    pub name: String,

    /// Container image
    pub image: String,

    /// Image pull policy
    #[serde(default)]
    pub image_pull_policy: Option<String>,

    /// Service account for the pods
    #[serde(default)]
    pub service_account_name: Option<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: Vec<EnvVar>,

    /// Container ports (defaults to the node type's port when empty)
    #[serde(default)]
    pub ports: Vec<ContainerPort>,

    #[serde(default)]
    pub liveness_probe: Option<Probe>,

    #[serde(default)]
    pub readiness_probe: Option<Probe>,

    #[serde(default)]
    pub startup_probe: Option<Probe>,

    /// Container resources
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,

    /// Extra pod volumes
    #[serde(default)]
    pub volumes: Vec<Volume>,

    /// Extra container volume mounts
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(default)]
    pub tolerations: Vec<Toleration>,

    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Extra pod labels and annotations
    #[serde(default)]
    pub pod_metadata: PodMetadata,

    /// Service spec for the node's network endpoint
    #[serde(default)]
    pub service: Option<ServiceSpec>,

    /// Persistent storage templates
    #[serde(default)]
    pub storage_config: Vec<StorageConfig>,
}

/// Pod labels and annotations
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct PodMetadata {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A persistent volume template mounted into a node
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Storage name, suffix of the claim name
    pub name: String,
    /// Mount path inside the container
    pub mount_path: String,
    /// Claim spec
    pub spec: PersistentVolumeClaimSpec,
}

/// Pinot configuration shared by any number of nodes
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct PinotNodeConfigGroup {
    /// Group name
    pub name: String,

    /// JVM options passed through `JAVA_OPTS`
    #[serde(default)]
    pub java_opts: String,

    /// Opaque Pinot properties text
    #[serde(default)]
    pub data: String,
}

/// External services the cluster depends on
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSpec {
    #[serde(default)]
    pub zookeeper: ZookeeperSpec,

    #[serde(default)]
    pub deep_storage: Option<DeepStorageSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct ZookeeperSpec {
    #[serde(default)]
    pub spec: ZookeeperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperConfig {
    /// Coordination service address, e.g. `zk:2181`
    #[serde(default)]
    pub zk_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct DeepStorageSpec {
    #[serde(default)]
    pub spec: Vec<DeepStorageConfig>,
}

/// Deep storage properties appended to one node type's configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeepStorageConfig {
    pub node_type: NodeType,
    pub data: String,
}

/// Reference to a basic-auth secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSecretRef {
    /// Secret name
    pub secret_name: String,
    /// Secret namespace (defaults to the Pinot document's namespace)
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Status of the Pinot cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PinotStatus {
    #[serde(default)]
    pub phase: PinotPhase,

    /// Rendered workloads and their config hashes
    #[serde(default)]
    pub nodes: Vec<NodeStatus>,

    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,

    #[serde(default)]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Phase of the cluster lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum PinotPhase {
    /// Children not yet applied
    #[default]
    Pending,
    /// All children applied
    Running,
    /// Spec could not be synthesized
    Failed,
}

/// Per-node entry of the cluster status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub name: String,
    pub node_type: NodeType,
    pub workload: String,
    pub config_hash: String,
}

/// Condition of the cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last time the condition transitioned
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

fn default_replicas() -> i32 {
    1
}
