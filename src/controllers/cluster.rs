//! Pinot Controller
//!
//! Reconciles Pinot custom resources: synthesizes the cluster topology and
//! applies ConfigMaps, PersistentVolumeClaims, Services and workloads.
//! Children carry an owner reference, so deleting the Pinot document lets
//! the garbage collector remove them.

use super::{error_policy_backoff, generation_changes, should_reconcile, watch_api};
use crate::conditions::{
    build_condition, set_condition, ConditionFields, CLUSTER_CONDITION_CONFIGURED,
    CLUSTER_CONDITION_READY, CONDITION_FALSE, CONDITION_TRUE,
};
use crate::config::OperatorConfig;
use crate::crd::{Pinot, PinotPhase, PinotStatus};
use crate::error::{OperatorError, Result};
use crate::events::{actions, EventPublisher, KubeEventPublisher};
use crate::labels::{APPLIED_HASH_ANNOTATION, FIELD_MANAGER};
use crate::topology::{object_hash, synthesize, Topology, Workload};
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::EventType;
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info};

const RECONCILE_ANNOTATION: &str = "pinot.datainfra.io/reconcile";

/// Context for the Pinot controller
pub struct PinotController {
    client: Client,
    config: OperatorConfig,
    events: Arc<dyn EventPublisher>,
}

impl PinotController {
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), "pinot-controller"));
        Self {
            client,
            config,
            events,
        }
    }

    /// Run the Pinot controller
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let (pinots, reader) = generation_changes(watch_api::<Pinot>(&self.client, &self.config));

        info!("Starting Pinot controller");

        Controller::for_stream(pinots, reader)
            .owns(watch_api::<ConfigMap>(&self.client, &self.config), Config::default())
            .owns(watch_api::<Service>(&self.client, &self.config), Config::default())
            .owns(watch_api::<StatefulSet>(&self.client, &self.config), Config::default())
            .owns(watch_api::<Deployment>(&self.client, &self.config), Config::default())
            .shutdown_on_signal()
            .run(
                |pinot, ctx| async move { ctx.reconcile(pinot).await },
                |_pinot, error, ctx| error_policy_backoff(error, ctx.config.reconcile_wait),
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!(name = %obj.name, namespace = ?obj.namespace, "Reconciled Pinot");
                    }
                    Err(e) => {
                        error!("Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn reconcile(&self, pinot: Arc<Pinot>) -> std::result::Result<Action, OperatorError> {
        let name = pinot.name_any();
        let namespace = pinot.namespace().unwrap_or_else(|| "default".to_string());
        let wait = self.config.reconcile_wait;

        if !should_reconcile(pinot.as_ref(), RECONCILE_ANNOTATION, &self.config) {
            debug!(name = %name, namespace = %namespace, "Skipping filtered Pinot");
            return Ok(Action::requeue(wait));
        }

        // Children are owned by the document; the garbage collector removes them
        if pinot.metadata.deletion_timestamp.is_some() {
            return Ok(Action::await_change());
        }

        info!(name = %name, namespace = %namespace, "Reconciling Pinot");

        let topology = match synthesize(&pinot) {
            Ok(topology) => topology,
            Err(e) => {
                self.events
                    .publish(
                        &pinot.object_ref(&()),
                        EventType::Warning,
                        "InvalidSpec",
                        actions::RECONCILE,
                        Some(e.to_string()),
                    )
                    .await;
                self.update_status(&pinot, &namespace, cluster_status(&pinot, Err(&e)))
                    .await?;
                return Err(e);
            }
        };

        let changed = self.apply_topology(&namespace, &topology).await?;
        info!(name = %name, namespace = %namespace, changed, "Applied Pinot topology");

        self.update_status(&pinot, &namespace, cluster_status(&pinot, Ok(&topology)))
            .await?;

        Ok(Action::requeue(wait))
    }

    /// Apply every child; config maps and claims go first so workloads never
    /// reference something missing. Returns the number of objects written.
    async fn apply_topology(&self, namespace: &str, topology: &Topology) -> Result<usize> {
        let mut changed = 0;
        for config_map in &topology.config_maps {
            changed += usize::from(self.apply(namespace, config_map.clone()).await?);
        }
        for claim in &topology.storage_claims {
            changed += usize::from(self.apply::<PersistentVolumeClaim>(namespace, claim.clone()).await?);
        }
        for service in &topology.services {
            changed += usize::from(self.apply(namespace, service.clone()).await?);
        }
        for workload in &topology.workloads {
            let written = match workload {
                Workload::StatefulSet(sts) => self.apply(namespace, sts.clone()).await?,
                Workload::Deployment(deploy) => self.apply(namespace, deploy.clone()).await?,
            };
            changed += usize::from(written);
        }
        Ok(changed)
    }

    /// Create the object, or patch it when its fingerprint differs from the
    /// one recorded on the live object or the live object drifted. Returns
    /// whether anything was written.
    async fn apply<K>(&self, namespace: &str, mut desired: K) -> Result<bool>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + LiveDrift
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        let name = desired.name_any();
        let hash = object_hash(&desired)?;
        desired
            .annotations_mut()
            .insert(APPLIED_HASH_ANNOTATION.to_string(), hash.clone());

        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get_opt(&name).await? {
            Some(existing) if !apply_needed(&existing, &desired, &hash) => {
                debug!(kind = %K::kind(&()), name = %name, "Unchanged");
                Ok(false)
            }
            Some(_) => {
                debug!(kind = %K::kind(&()), name = %name, "Patching");
                api.patch(
                    &name,
                    &PatchParams::apply(FIELD_MANAGER).force(),
                    &Patch::Apply(&desired),
                )
                .await?;
                Ok(true)
            }
            None => {
                debug!(kind = %K::kind(&()), name = %name, "Creating");
                api.create(&PostParams::default(), &desired).await?;
                Ok(true)
            }
        }
    }

    async fn update_status(&self, pinot: &Pinot, namespace: &str, status: PinotStatus) -> Result<()> {
        if !status_changed(pinot.status.as_ref(), &status) {
            debug!(name = %pinot.name_any(), "Status unchanged");
            return Ok(());
        }
        let pinots: Api<Pinot> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });
        pinots
            .patch_status(&pinot.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Fields the operator owns that others are known to edit in place
/// (`kubectl scale`, `kubectl edit configmap`). Everything else is only
/// re-applied when the desired fingerprint changes.
pub trait LiveDrift {
    fn drifted_from(&self, _desired: &Self) -> bool {
        false
    }
}

impl LiveDrift for ConfigMap {
    fn drifted_from(&self, desired: &Self) -> bool {
        self.data != desired.data
    }
}

impl LiveDrift for Service {
    fn drifted_from(&self, desired: &Self) -> bool {
        let selector = |svc: &Service| svc.spec.as_ref().and_then(|s| s.selector.clone());
        selector(self) != selector(desired)
    }
}

impl LiveDrift for PersistentVolumeClaim {}

impl LiveDrift for StatefulSet {
    fn drifted_from(&self, desired: &Self) -> bool {
        let replicas = |sts: &StatefulSet| sts.spec.as_ref().and_then(|s| s.replicas);
        replicas(self) != replicas(desired)
    }
}

impl LiveDrift for Deployment {
    fn drifted_from(&self, desired: &Self) -> bool {
        let replicas = |deploy: &Deployment| deploy.spec.as_ref().and_then(|s| s.replicas);
        replicas(self) != replicas(desired)
    }
}

/// Whether `live` must be re-applied to reach `desired` carrying `hash`.
pub fn apply_needed<K: Resource + LiveDrift>(live: &K, desired: &K, hash: &str) -> bool {
    live.annotations().get(APPLIED_HASH_ANNOTATION).map(String::as_str) != Some(hash)
        || live.drifted_from(desired)
}

/// Status after a pass: `Running` with per-node hashes once children are
/// applied, `Failed` with the reason when synthesis is rejected.
pub fn cluster_status(pinot: &Pinot, result: std::result::Result<&Topology, &OperatorError>) -> PinotStatus {
    let previous = pinot.status.clone().unwrap_or_default();
    let mut conditions: Vec<ConditionFields> = previous
        .conditions
        .into_iter()
        .map(ConditionFields::from)
        .collect();

    let (phase, nodes) = match result {
        Ok(topology) => {
            let message = format!("{} nodes applied", topology.nodes.len());
            set_condition(
                &mut conditions,
                build_condition(CLUSTER_CONDITION_CONFIGURED, CONDITION_TRUE, "Synthesized", "Topology synthesized"),
            );
            set_condition(
                &mut conditions,
                build_condition(CLUSTER_CONDITION_READY, CONDITION_TRUE, "Applied", &message),
            );
            (PinotPhase::Running, topology.nodes.clone())
        }
        Err(e) => {
            set_condition(
                &mut conditions,
                build_condition(CLUSTER_CONDITION_CONFIGURED, CONDITION_FALSE, "InvalidSpec", &e.to_string()),
            );
            set_condition(
                &mut conditions,
                build_condition(CLUSTER_CONDITION_READY, CONDITION_FALSE, "InvalidSpec", &e.to_string()),
            );
            (PinotPhase::Failed, previous.nodes)
        }
    };

    PinotStatus {
        phase,
        nodes,
        conditions: conditions
            .into_iter()
            .map(ConditionFields::into_cluster_condition)
            .collect(),
        observed_generation: pinot.metadata.generation,
        last_updated: Some(Utc::now().to_rfc3339()),
    }
}

/// Whether writing `next` would change anything beyond `lastUpdated`.
pub fn status_changed(previous: Option<&PinotStatus>, next: &PinotStatus) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let strip = |status: &PinotStatus| PinotStatus {
        last_updated: None,
        ..status.clone()
    };
    strip(previous) != strip(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ClusterCondition, NodeStatus, NodeType, PinotSpec};

    fn pinot() -> Pinot {
        let mut pinot = Pinot::new(
            "c1",
            PinotSpec {
                deployment_order: vec![NodeType::Controller],
                external: Default::default(),
                k8s_config_groups: vec![],
                pinot_node_config_groups: vec![],
                nodes: vec![],
                plugins: vec![],
                auth: None,
            },
        );
        pinot.metadata.generation = Some(3);
        pinot
    }

    fn topology() -> Topology {
        Topology {
            nodes: vec![NodeStatus {
                name: "pinot-controller".to_string(),
                node_type: NodeType::Controller,
                workload: "pinot-controller-ctrl".to_string(),
                config_hash: "abc".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_status_after_apply() {
        let status = cluster_status(&pinot(), Ok(&topology()));
        assert_eq!(status.phase, PinotPhase::Running);
        assert_eq!(status.nodes[0].config_hash, "abc");
        assert_eq!(status.observed_generation, Some(3));
        let ready = status.conditions.iter().find(|c| c.r#type == "Ready").unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.message.as_deref(), Some("1 nodes applied"));
    }

    #[test]
    fn test_status_after_rejected_spec_keeps_nodes() {
        let mut pinot = pinot();
        pinot.status = Some(PinotStatus {
            nodes: topology().nodes,
            ..Default::default()
        });

        let err = OperatorError::ConfigurationNotFound {
            group_kind: "pinotNodeConfig",
            name: "g9".to_string(),
        };
        let status = cluster_status(&pinot, Err(&err));

        assert_eq!(status.phase, PinotPhase::Failed);
        assert_eq!(status.nodes.len(), 1);
        let configured = status
            .conditions
            .iter()
            .find(|c| c.r#type == "Configured")
            .unwrap();
        assert_eq!(configured.status, "False");
        assert!(configured.message.as_deref().unwrap().contains("g9"));
    }

    #[test]
    fn test_repeated_pass_leaves_status_unchanged() {
        let mut pinot = pinot();
        let first = cluster_status(&pinot, Ok(&topology()));
        assert!(status_changed(pinot.status.as_ref(), &first));

        pinot.status = Some(first);
        let second = cluster_status(&pinot, Ok(&topology()));
        assert!(!status_changed(pinot.status.as_ref(), &second));

        pinot.metadata.generation = Some(4);
        let bumped = cluster_status(&pinot, Ok(&topology()));
        assert!(status_changed(pinot.status.as_ref(), &bumped));
    }

    #[test]
    fn test_ready_transition_time_kept_while_ready() {
        let mut pinot = pinot();
        pinot.status = Some(PinotStatus {
            conditions: vec![ClusterCondition {
                r#type: "Ready".to_string(),
                status: "True".to_string(),
                last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
                reason: Some("Applied".to_string()),
                message: None,
            }],
            ..Default::default()
        });

        let status = cluster_status(&pinot, Ok(&topology()));
        let ready = status.conditions.iter().find(|c| c.r#type == "Ready").unwrap();
        assert_eq!(
            ready.last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    fn stateful_set(replicas: i32, hash: &str) -> StatefulSet {
        let mut sts = StatefulSet {
            spec: Some(k8s_openapi::api::apps::v1::StatefulSetSpec {
                replicas: Some(replicas),
                ..Default::default()
            }),
            ..Default::default()
        };
        sts.metadata.name = Some("pinot-server".to_string());
        sts.annotations_mut()
            .insert(APPLIED_HASH_ANNOTATION.to_string(), hash.to_string());
        sts
    }

    #[test]
    fn test_apply_needed_on_hash_change_or_scaled_workload() {
        let desired = stateful_set(3, "h1");
        assert!(!apply_needed(&stateful_set(3, "h1"), &desired, "h1"));
        assert!(apply_needed(&stateful_set(3, "h0"), &desired, "h1"));

        // Scaled out of band; the annotation still matches.
        assert!(apply_needed(&stateful_set(5, "h1"), &desired, "h1"));
    }

    #[test]
    fn test_apply_needed_on_edited_config_map() {
        let config_map = |value: &str| {
            let mut cm = ConfigMap {
                data: Some([("pinot-server.conf".to_string(), value.to_string())].into()),
                ..Default::default()
            };
            cm.annotations_mut()
                .insert(APPLIED_HASH_ANNOTATION.to_string(), "h1".to_string());
            cm
        };
        let desired = config_map("a=1");
        assert!(!apply_needed(&config_map("a=1"), &desired, "h1"));
        assert!(apply_needed(&config_map("a=2"), &desired, "h1"));
    }
}
