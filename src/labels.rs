//! Names and labels for objects derived from a Pinot document.
//!
//! Every function here is pure so that synthesizing the same document twice
//! always yields the same object identities.

use crate::crd::{NodeSpec, NodeType};
use std::collections::BTreeMap;

pub const LABEL_APP: &str = "app";
pub const LABEL_CLUSTER: &str = "custom_resource";
pub const LABEL_NODE_TYPE: &str = "nodeType";
pub const LABEL_PINOT_CONFIG_GROUP: &str = "pinotConfigGroup";
pub const LABEL_K8S_CONFIG_GROUP: &str = "k8sConfigGroup";

pub const APP_NAME: &str = "pinot";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "pinot-operator";

/// Annotation carrying the fingerprint of the last applied child object
pub const APPLIED_HASH_ANNOTATION: &str = "datainfra.io/applied-hash";

/// `<cluster>-<configGroup>-config`
pub fn config_map_name(cluster: &str, pinot_config_group: &str) -> String {
    format!("{}-{}-config", cluster, pinot_config_group)
}

/// `<node>-<k8sConfigGroup>`
pub fn workload_name(node: &str, k8s_config_group: &str) -> String {
    format!("{}-{}", node, k8s_config_group)
}

/// `<node>-<k8sConfigGroup>-svc`
pub fn service_name(node: &str, k8s_config_group: &str) -> String {
    format!("{}-{}-svc", node, k8s_config_group)
}

/// `<node>-<k8sConfigGroup>-<storage>`
pub fn storage_claim_name(node: &str, k8s_config_group: &str, storage: &str) -> String {
    format!("{}-{}-{}", node, k8s_config_group, storage)
}

/// Container name for a node: `<node>-<nodeType>`
pub fn container_name(node: &str, node_type: NodeType) -> String {
    format!("{}-{}", node, node_type)
}

/// Labels carried by every child object of one node.
pub fn node_labels(cluster: &str, node: &NodeSpec) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), APP_NAME.to_string());
    labels.insert(LABEL_CLUSTER.to_string(), cluster.to_string());
    labels.insert(LABEL_NODE_TYPE.to_string(), node.node_type.to_string());
    labels.insert(
        LABEL_PINOT_CONFIG_GROUP.to_string(),
        node.pinot_node_config.clone(),
    );
    labels.insert(LABEL_K8S_CONFIG_GROUP.to_string(), node.k8s_config.clone());
    labels
}

/// Labels for a config map, which may be shared by nodes of several types.
pub fn config_map_labels(cluster: &str, pinot_config_group: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), APP_NAME.to_string());
    labels.insert(LABEL_CLUSTER.to_string(), cluster.to_string());
    labels.insert(
        LABEL_PINOT_CONFIG_GROUP.to_string(),
        pinot_config_group.to_string(),
    );
    labels
}

/// Label selector matching the controller service(s) of a cluster.
pub fn controller_selector(cluster: &str) -> String {
    format!(
        "{}={},{}={}",
        LABEL_CLUSTER,
        cluster,
        LABEL_NODE_TYPE,
        NodeType::Controller
    )
}
