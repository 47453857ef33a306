//! Topology synthesis
//!
//! Turns a Pinot document into the complete, ordered set of Kubernetes
//! objects that run it: one config map per Pinot config group, and per node
//! a workload, a service and its storage claims. Synthesis is pure; the
//! cluster controller persists the result.

mod hash;
mod node_type;

pub use hash::{config_hash, config_map_hash, hash_env_var, object_hash};
pub use node_type::{profile, startup_args, NodeProfile};

use crate::crd::{
    ExternalSpec, K8sConfigGroup, NodeSpec, NodeStatus, NodeType, Pinot, PinotNodeConfigGroup,
    PinotSpec, StorageConfig, WorkloadKind,
};
use crate::error::{OperatorError, Result};
use crate::labels;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, PersistentVolumeClaim,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Workload backing one node
#[derive(Debug, Clone)]
pub enum Workload {
    StatefulSet(StatefulSet),
    Deployment(Deployment),
}

impl Workload {
    pub fn name(&self) -> String {
        match self {
            Workload::StatefulSet(sts) => sts.name_any(),
            Workload::Deployment(deploy) => deploy.name_any(),
        }
    }

    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Workload::StatefulSet(sts) => sts.spec.as_ref().map(|s| &s.template),
            Workload::Deployment(deploy) => deploy.spec.as_ref().map(|s| &s.template),
        }
    }

    /// The node's Pinot container
    pub fn container(&self) -> Option<&Container> {
        self.pod_template()
            .and_then(|t| t.spec.as_ref())
            .and_then(|s| s.containers.first())
    }
}

/// Everything derived from one Pinot document
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub config_maps: Vec<ConfigMap>,
    /// Workloads in deployment order
    pub workloads: Vec<Workload>,
    pub services: Vec<Service>,
    /// Standalone claims (Deployment-backed nodes only; StatefulSets carry templates)
    pub storage_claims: Vec<PersistentVolumeClaim>,
    /// Per-node summary for the cluster status
    pub nodes: Vec<NodeStatus>,
}

/// Shared inputs for every object of one cluster
struct ClusterContext<'a> {
    cluster: String,
    namespace: Option<String>,
    owner: OwnerReference,
    external: &'a ExternalSpec,
    plugins: &'a [String],
}

impl ClusterContext<'_> {
    fn metadata(&self, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace: self.namespace.clone(),
            labels: Some(labels),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }
}

/// Synthesize the full child set of a Pinot document.
pub fn synthesize(pinot: &Pinot) -> Result<Topology> {
    let spec = &pinot.spec;
    let ctx = ClusterContext {
        cluster: pinot.name_any(),
        namespace: pinot.namespace(),
        owner: owner_reference(pinot),
        external: &spec.external,
        plugins: &spec.plugins,
    };

    let ordered = ordered_nodes(spec)?;

    // Config group name -> config file name -> rendered text
    let mut bundles: BTreeMap<&str, BTreeMap<String, String>> = BTreeMap::new();
    for node in &ordered {
        k8s_group(spec, &node.k8s_config)?;
        let group = pinot_group(spec, &node.pinot_node_config)?;
        bundles.entry(group.name.as_str()).or_default().insert(
            profile(node.node_type).config_file.to_string(),
            render_config(&ctx.cluster, ctx.external, group, node.node_type),
        );
    }

    let mut topology = Topology::default();
    let mut hashes = BTreeMap::new();
    for (group, data) in bundles {
        hashes.insert(group, config_hash(&data));
        topology.config_maps.push(ConfigMap {
            metadata: ctx.metadata(
                labels::config_map_name(&ctx.cluster, group),
                labels::config_map_labels(&ctx.cluster, group),
            ),
            data: Some(data),
            ..Default::default()
        });
    }

    for node in ordered {
        let k8s = k8s_group(spec, &node.k8s_config)?;
        let group = pinot_group(spec, &node.pinot_node_config)?;
        let config_hash = hashes
            .get(group.name.as_str())
            .cloned()
            .unwrap_or_default();

        let ports = container_ports(node.node_type, k8s);
        let template = pod_template(&ctx, node, k8s, group, &config_hash, &ports);
        let workload_name = labels::workload_name(&node.name, &k8s.name);
        let node_labels = labels::node_labels(&ctx.cluster, node);
        let selector = LabelSelector {
            match_labels: Some(node_labels.clone()),
            ..Default::default()
        };

        let workload = match node.kind {
            WorkloadKind::Statefulset => {
                let templates = k8s
                    .storage_config
                    .iter()
                    .map(|storage| claim_template(&ctx, node, k8s, storage))
                    .collect::<Vec<_>>();
                Workload::StatefulSet(StatefulSet {
                    metadata: ctx.metadata(workload_name.clone(), node_labels.clone()),
                    spec: Some(StatefulSetSpec {
                        replicas: Some(node.replicas),
                        selector,
                        service_name: Some(labels::service_name(&node.name, &k8s.name)),
                        template,
                        volume_claim_templates: non_empty(templates),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            }
            WorkloadKind::Deployment => {
                for storage in &k8s.storage_config {
                    let mut claim = claim_template(&ctx, node, k8s, storage);
                    claim.metadata.namespace = ctx.namespace.clone();
                    claim.metadata.owner_references = Some(vec![ctx.owner.clone()]);
                    topology.storage_claims.push(claim);
                }
                Workload::Deployment(Deployment {
                    metadata: ctx.metadata(workload_name.clone(), node_labels.clone()),
                    spec: Some(DeploymentSpec {
                        replicas: Some(node.replicas),
                        selector,
                        template,
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            }
        };

        topology.workloads.push(workload);
        topology.services.push(service(&ctx, node, k8s, &ports));
        topology.nodes.push(NodeStatus {
            name: node.name.clone(),
            node_type: node.node_type,
            workload: workload_name,
            config_hash,
        });
    }

    Ok(topology)
}

/// Nodes grouped by `deploymentOrder`, declaration order kept within a type.
pub fn ordered_nodes(spec: &PinotSpec) -> Result<Vec<&NodeSpec>> {
    if let Some(node) = spec
        .nodes
        .iter()
        .find(|n| !spec.deployment_order.contains(&n.node_type))
    {
        return Err(OperatorError::NodeTypeNotOrdered(node.node_type.to_string()));
    }

    let mut seen: Vec<NodeType> = Vec::new();
    let mut ordered = Vec::with_capacity(spec.nodes.len());
    for node_type in &spec.deployment_order {
        if seen.contains(node_type) {
            continue;
        }
        seen.push(*node_type);
        ordered.extend(spec.nodes.iter().filter(|n| n.node_type == *node_type));
    }
    Ok(ordered)
}

/// Group text followed by the cluster identity, coordination address and
/// the deep storage fragment for this node type.
pub fn render_config(
    cluster: &str,
    external: &ExternalSpec,
    group: &PinotNodeConfigGroup,
    node_type: NodeType,
) -> String {
    let profile = profile(node_type);
    let mut lines = Vec::new();

    let base = group.data.trim_end();
    if !base.is_empty() {
        lines.push(base.to_string());
    }
    lines.push(format!("{}={}", profile.cluster_key, cluster));
    lines.push(format!(
        "{}={}",
        profile.zk_key, external.zookeeper.spec.zk_address
    ));

    if let Some(deep_storage) = &external.deep_storage {
        for fragment in deep_storage
            .spec
            .iter()
            .filter(|d| d.node_type == node_type)
            .map(|d| d.data.trim_end())
            .filter(|d| !d.is_empty())
        {
            lines.push(fragment.to_string());
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// `JAVA_OPTS` value: group options followed by one include flag per plugin.
pub fn java_opts(group: &PinotNodeConfigGroup, plugins: &[String]) -> Option<String> {
    let mut parts = Vec::new();
    if !group.java_opts.trim().is_empty() {
        parts.push(group.java_opts.trim().to_string());
    }
    parts.extend(plugins.iter().map(|p| format!("-Dplugins.include={}", p)));

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn k8s_group<'a>(spec: &'a PinotSpec, name: &str) -> Result<&'a K8sConfigGroup> {
    spec.k8s_config_groups
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| OperatorError::ConfigurationNotFound {
            group_kind: "k8sConfig",
            name: name.to_string(),
        })
}

fn pinot_group<'a>(spec: &'a PinotSpec, name: &str) -> Result<&'a PinotNodeConfigGroup> {
    spec.pinot_node_config_groups
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| OperatorError::ConfigurationNotFound {
            group_kind: "pinotNodeConfig",
            name: name.to_string(),
        })
}

fn owner_reference(pinot: &Pinot) -> OwnerReference {
    OwnerReference {
        api_version: Pinot::api_version(&()).to_string(),
        kind: Pinot::kind(&()).to_string(),
        name: pinot.name_any(),
        uid: pinot.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn container_ports(node_type: NodeType, k8s: &K8sConfigGroup) -> Vec<ContainerPort> {
    if !k8s.ports.is_empty() {
        return k8s.ports.clone();
    }
    vec![ContainerPort {
        name: Some(node_type.to_string()),
        container_port: profile(node_type).default_port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }]
}

fn pod_template(
    ctx: &ClusterContext<'_>,
    node: &NodeSpec,
    k8s: &K8sConfigGroup,
    group: &PinotNodeConfigGroup,
    config_hash: &str,
    ports: &[ContainerPort],
) -> PodTemplateSpec {
    let profile = profile(node.node_type);
    let config_map_name = labels::config_map_name(&ctx.cluster, &group.name);

    let mut env = k8s.env.clone();
    if let Some(opts) = java_opts(group, ctx.plugins) {
        env.push(EnvVar {
            name: "JAVA_OPTS".to_string(),
            value: Some(opts),
            ..Default::default()
        });
    }
    env.push(hash_env_var(&config_map_name, config_hash));

    let mut volumes = vec![Volume {
        name: config_map_name.clone(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }];

    let mut mounts = Vec::new();
    for storage in &k8s.storage_config {
        let claim_name = labels::storage_claim_name(&node.name, &k8s.name, &storage.name);
        mounts.push(VolumeMount {
            name: claim_name.clone(),
            mount_path: storage.mount_path.clone(),
            ..Default::default()
        });
        if node.kind == WorkloadKind::Deployment {
            volumes.push(Volume {
                name: claim_name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name,
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
    }
    mounts.push(VolumeMount {
        name: config_map_name,
        mount_path: profile.config_dir.to_string(),
        ..Default::default()
    });
    mounts.extend(k8s.volume_mounts.iter().cloned());
    volumes.extend(k8s.volumes.iter().cloned());

    let container = Container {
        name: labels::container_name(&node.name, node.node_type),
        image: Some(k8s.image.clone()),
        image_pull_policy: k8s.image_pull_policy.clone(),
        args: Some(startup_args(
            node.node_type,
            &ctx.cluster,
            &ctx.external.zookeeper.spec.zk_address,
        )),
        ports: Some(ports.to_vec()),
        env: Some(env),
        volume_mounts: Some(mounts),
        resources: k8s.resources.clone(),
        liveness_probe: k8s.liveness_probe.clone(),
        readiness_probe: k8s.readiness_probe.clone(),
        startup_probe: k8s.startup_probe.clone(),
        ..Default::default()
    };

    // Node labels win over user pod labels so the selector keeps matching
    let mut pod_labels = k8s.pod_metadata.labels.clone();
    pod_labels.extend(labels::node_labels(&ctx.cluster, node));

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(pod_labels),
            annotations: if k8s.pod_metadata.annotations.is_empty() {
                None
            } else {
                Some(k8s.pod_metadata.annotations.clone())
            },
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(volumes),
            service_account_name: k8s.service_account_name.clone(),
            node_selector: if k8s.node_selector.is_empty() {
                None
            } else {
                Some(k8s.node_selector.clone())
            },
            tolerations: non_empty(k8s.tolerations.clone()),
            ..Default::default()
        }),
    }
}

fn claim_template(
    ctx: &ClusterContext<'_>,
    node: &NodeSpec,
    k8s: &K8sConfigGroup,
    storage: &StorageConfig,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(labels::storage_claim_name(
                &node.name,
                &k8s.name,
                &storage.name,
            )),
            labels: Some(labels::node_labels(&ctx.cluster, node)),
            ..Default::default()
        },
        spec: Some(storage.spec.clone()),
        ..Default::default()
    }
}

fn service(
    ctx: &ClusterContext<'_>,
    node: &NodeSpec,
    k8s: &K8sConfigGroup,
    ports: &[ContainerPort],
) -> Service {
    let node_labels = labels::node_labels(&ctx.cluster, node);
    let mut spec = k8s.service.clone().unwrap_or_default();
    spec.selector = Some(node_labels.clone());
    if spec.ports.as_ref().map_or(true, |p| p.is_empty()) {
        spec.ports = Some(
            ports
                .iter()
                .map(|p| ServicePort {
                    name: p.name.clone(),
                    port: p.container_port,
                    target_port: Some(IntOrString::Int(p.container_port)),
                    protocol: p.protocol.clone(),
                    ..Default::default()
                })
                .collect(),
        );
    }

    Service {
        metadata: ctx.metadata(labels::service_name(&node.name, &k8s.name), node_labels),
        spec: Some(spec),
        ..Default::default()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DeepStorageConfig, DeepStorageSpec};

    fn k8s(name: &str) -> K8sConfigGroup {
        K8sConfigGroup {
            name: name.to_string(),
            image: "apachepinot/pinot:1.0.0".to_string(),
            ..Default::default()
        }
    }

    fn group(name: &str, data: &str) -> PinotNodeConfigGroup {
        PinotNodeConfigGroup {
            name: name.to_string(),
            java_opts: String::new(),
            data: data.to_string(),
        }
    }

    fn node(name: &str, node_type: NodeType, k8s: &str, group: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            kind: WorkloadKind::Statefulset,
            node_type,
            replicas: 1,
            k8s_config: k8s.to_string(),
            pinot_node_config: group.to_string(),
        }
    }

    fn cluster(spec: PinotSpec) -> Pinot {
        let mut pinot = Pinot::new("c1", spec);
        pinot.metadata.namespace = Some("ns".to_string());
        pinot.metadata.uid = Some("uid-1".to_string());
        pinot
    }

    fn base_spec() -> PinotSpec {
        let mut external = ExternalSpec::default();
        external.zookeeper.spec.zk_address = "zk:2181".to_string();
        PinotSpec {
            deployment_order: vec![NodeType::Controller, NodeType::Broker],
            external,
            k8s_config_groups: vec![k8s("controllerk8s"), k8s("brokerk8s")],
            pinot_node_config_groups: vec![group("g1", "x=1")],
            nodes: vec![
                node("pinot-broker", NodeType::Broker, "brokerk8s", "g1"),
                node("pinot-controller", NodeType::Controller, "controllerk8s", "g1"),
            ],
            plugins: vec![],
            auth: None,
        }
    }

    fn env_value(workload: &Workload, name: &str) -> Option<String> {
        workload
            .container()
            .and_then(|c| c.env.as_ref())
            .and_then(|env| env.iter().find(|e| e.name == name))
            .and_then(|e| e.value.clone())
    }

    #[test]
    fn test_two_node_cluster_scenario() {
        let topology = synthesize(&cluster(base_spec())).unwrap();

        assert_eq!(topology.config_maps.len(), 1);
        let config_map = &topology.config_maps[0];
        assert_eq!(config_map.metadata.name.as_deref(), Some("c1-g1-config"));
        let data = config_map.data.as_ref().unwrap();
        let controller_conf = &data["pinot-controller.conf"];
        assert!(controller_conf.contains("x=1"));
        assert!(controller_conf.contains("controller.zk.str=zk:2181"));
        assert!(controller_conf.contains("controller.helix.cluster.name=c1"));
        assert!(data["pinot-broker.conf"].contains("pinot.zk.server=zk:2181"));

        // deploymentOrder puts the controller first even though it is declared second
        let names: Vec<_> = topology.workloads.iter().map(|w| w.name()).collect();
        assert_eq!(
            names,
            vec!["pinot-controller-controllerk8s", "pinot-broker-brokerk8s"]
        );

        for (workload, node_type) in topology
            .workloads
            .iter()
            .zip([NodeType::Controller, NodeType::Broker])
        {
            let args = workload.container().unwrap().args.clone().unwrap();
            assert!(args.iter().any(|a| a == "zk:2181"));
            assert!(args
                .iter()
                .any(|a| a.starts_with(profile(node_type).config_dir)));
            assert_eq!(args[0], profile(node_type).start_verb);
        }

        let services: Vec<_> = topology
            .services
            .iter()
            .map(|s| s.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(
            services,
            vec!["pinot-controller-controllerk8s-svc", "pinot-broker-brokerk8s-svc"]
        );
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let pinot = cluster(base_spec());
        let a = synthesize(&pinot).unwrap();
        let b = synthesize(&pinot).unwrap();

        assert_eq!(
            serde_json::to_value(&a.config_maps).unwrap(),
            serde_json::to_value(&b.config_maps).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&a.services).unwrap(),
            serde_json::to_value(&b.services).unwrap()
        );
        for (wa, wb) in a.workloads.iter().zip(b.workloads.iter()) {
            assert_eq!(
                serde_json::to_value(wa.pod_template()).unwrap(),
                serde_json::to_value(wb.pod_template()).unwrap()
            );
        }
        assert_eq!(a.nodes, b.nodes);
    }

    #[test]
    fn test_hash_changes_only_for_consumers_of_changed_group() {
        let mut spec = base_spec();
        spec.pinot_node_config_groups.push(group("g2", "y=1"));
        spec.nodes[0].pinot_node_config = "g2".to_string();
        let before = synthesize(&cluster(spec.clone())).unwrap();

        spec.pinot_node_config_groups[1].data = "y=2".to_string();
        let after = synthesize(&cluster(spec)).unwrap();

        let broker_before = env_value(&before.workloads[1], "c1-g2-config").unwrap();
        let broker_after = env_value(&after.workloads[1], "c1-g2-config").unwrap();
        assert_ne!(broker_before, broker_after);

        let controller_before = env_value(&before.workloads[0], "c1-g1-config").unwrap();
        let controller_after = env_value(&after.workloads[0], "c1-g1-config").unwrap();
        assert_eq!(controller_before, controller_after);
    }

    #[test]
    fn test_hash_env_matches_config_map() {
        let topology = synthesize(&cluster(base_spec())).unwrap();
        let expected = config_map_hash(&topology.config_maps[0]);
        for workload in &topology.workloads {
            assert_eq!(env_value(workload, "c1-g1-config"), Some(expected.clone()));
        }
        assert!(topology.nodes.iter().all(|n| n.config_hash == expected));
    }

    #[test]
    fn test_missing_groups_are_configuration_errors() {
        let mut spec = base_spec();
        spec.nodes[0].pinot_node_config = "missing".to_string();
        match synthesize(&cluster(spec)) {
            Err(OperatorError::ConfigurationNotFound { group_kind, name }) => {
                assert_eq!(group_kind, "pinotNodeConfig");
                assert_eq!(name, "missing");
            }
            other => panic!("unexpected result: {:?}", other.map(|t| t.nodes)),
        }

        let mut spec = base_spec();
        spec.nodes[1].k8s_config = "missing".to_string();
        assert!(matches!(
            synthesize(&cluster(spec)),
            Err(OperatorError::ConfigurationNotFound {
                group_kind: "k8sConfig",
                ..
            })
        ));
    }

    #[test]
    fn test_unordered_node_type_is_rejected() {
        let mut spec = base_spec();
        spec.nodes
            .push(node("pinot-minion", NodeType::Minion, "brokerk8s", "g1"));
        assert!(matches!(
            synthesize(&cluster(spec)),
            Err(OperatorError::NodeTypeNotOrdered(t)) if t == "minion"
        ));
    }

    #[test]
    fn test_java_opts_with_plugins() {
        let mut g = group("g1", "");
        g.java_opts = "-Xms1G".to_string();
        let plugins = vec!["pinot-s3".to_string(), "pinot-parquet".to_string()];
        assert_eq!(
            java_opts(&g, &plugins).as_deref(),
            Some("-Xms1G -Dplugins.include=pinot-s3 -Dplugins.include=pinot-parquet")
        );
        assert_eq!(java_opts(&group("g1", ""), &[]), None);

        let mut spec = base_spec();
        spec.plugins = plugins;
        let topology = synthesize(&cluster(spec)).unwrap();
        let opts = env_value(&topology.workloads[0], "JAVA_OPTS").unwrap();
        assert!(opts.contains("-Dplugins.include=pinot-s3"));
    }

    #[test]
    fn test_deep_storage_fragment_matches_node_type() {
        let mut spec = base_spec();
        spec.external.deep_storage = Some(DeepStorageSpec {
            spec: vec![DeepStorageConfig {
                node_type: NodeType::Controller,
                data: "controller.data.dir=s3://bucket".to_string(),
            }],
        });
        let topology = synthesize(&cluster(spec)).unwrap();
        let data = topology.config_maps[0].data.clone().unwrap();
        assert!(data["pinot-controller.conf"].contains("controller.data.dir=s3://bucket"));
        assert!(!data["pinot-broker.conf"].contains("s3://bucket"));
    }

    #[test]
    fn test_storage_for_statefulset_and_deployment() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "name": "data",
            "mountPath": "/var/pinot/data",
            "spec": {"accessModes": ["ReadWriteOnce"]}
        }))
        .unwrap();

        let mut spec = base_spec();
        spec.k8s_config_groups[0].storage_config = vec![storage.clone()];
        spec.k8s_config_groups[1].storage_config = vec![storage];
        spec.nodes[0].kind = WorkloadKind::Deployment;
        let topology = synthesize(&cluster(spec)).unwrap();

        let Workload::StatefulSet(controller) = &topology.workloads[0] else {
            panic!("controller should be a StatefulSet");
        };
        assert_eq!(
            controller.spec.as_ref().unwrap().service_name.as_deref(),
            Some("pinot-controller-controllerk8s-svc")
        );
        let templates = controller
            .spec
            .as_ref()
            .unwrap()
            .volume_claim_templates
            .clone()
            .unwrap();
        assert_eq!(
            templates[0].metadata.name.as_deref(),
            Some("pinot-controller-controllerk8s-data")
        );

        assert!(matches!(topology.workloads[1], Workload::Deployment(_)));
        assert_eq!(topology.storage_claims.len(), 1);
        let claim = &topology.storage_claims[0];
        assert_eq!(
            claim.metadata.name.as_deref(),
            Some("pinot-broker-brokerk8s-data")
        );
        assert_eq!(claim.metadata.namespace.as_deref(), Some("ns"));

        let mounts = topology.workloads[1]
            .container()
            .unwrap()
            .volume_mounts
            .clone()
            .unwrap();
        assert_eq!(mounts[0].name, "pinot-broker-brokerk8s-data");
        assert_eq!(mounts[1].mount_path, "/var/pinot/broker/config");
    }

    #[test]
    fn test_children_are_owned_by_cluster() {
        let topology = synthesize(&cluster(base_spec())).unwrap();
        let owners = topology.services[0]
            .metadata
            .owner_references
            .clone()
            .unwrap();
        assert_eq!(owners[0].kind, "Pinot");
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_default_port_from_node_type() {
        let topology = synthesize(&cluster(base_spec())).unwrap();
        let ports = topology.workloads[1].container().unwrap().ports.clone().unwrap();
        assert_eq!(ports[0].container_port, 8099);
        let svc_ports = topology.services[1]
            .spec
            .as_ref()
            .unwrap()
            .ports
            .clone()
            .unwrap();
        assert_eq!(svc_ports[0].port, 8099);
    }
}
