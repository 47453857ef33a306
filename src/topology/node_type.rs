//! Per-node-type startup table.

use crate::crd::NodeType;

/// Everything that differs between Pinot roles when rendering a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeProfile {
    /// `pinot-admin.sh` command that starts the role
    pub start_verb: &'static str,
    /// Directory the config map is mounted at
    pub config_dir: &'static str,
    /// File name of the rendered properties inside the config map
    pub config_file: &'static str,
    /// Port the role listens on when the config group declares none
    pub default_port: i32,
    /// Properties key receiving the cluster name
    pub cluster_key: &'static str,
    /// Properties key receiving the zookeeper address
    pub zk_key: &'static str,
}

impl NodeProfile {
    /// Absolute path of the rendered config file inside the container
    pub fn config_path(&self) -> String {
        format!("{}/{}", self.config_dir, self.config_file)
    }
}

pub fn profile(node_type: NodeType) -> NodeProfile {
    match node_type {
        NodeType::Controller => NodeProfile {
            start_verb: "StartController",
            config_dir: "/var/pinot/controller/config",
            config_file: "pinot-controller.conf",
            default_port: 9000,
            cluster_key: "controller.helix.cluster.name",
            zk_key: "controller.zk.str",
        },
        NodeType::Broker => NodeProfile {
            start_verb: "StartBroker",
            config_dir: "/var/pinot/broker/config",
            config_file: "pinot-broker.conf",
            default_port: 8099,
            cluster_key: "pinot.cluster.name",
            zk_key: "pinot.zk.server",
        },
        NodeType::Server => NodeProfile {
            start_verb: "StartServer",
            config_dir: "/var/pinot/server/config",
            config_file: "pinot-server.conf",
            default_port: 8098,
            cluster_key: "pinot.cluster.name",
            zk_key: "pinot.zk.server",
        },
        NodeType::Minion => NodeProfile {
            start_verb: "StartMinion",
            config_dir: "/var/pinot/minion/config",
            config_file: "pinot-minion.conf",
            default_port: 9514,
            cluster_key: "pinot.cluster.name",
            zk_key: "pinot.zk.server",
        },
    }
}

/// Container arguments for a node of the given type.
pub fn startup_args(node_type: NodeType, cluster: &str, zk_address: &str) -> Vec<String> {
    let profile = profile(node_type);
    vec![
        profile.start_verb.to_string(),
        "-clusterName".to_string(),
        cluster.to_string(),
        "-zkAddress".to_string(),
        zk_address.to_string(),
        "-configFileName".to_string(),
        profile.config_path(),
    ]
}
