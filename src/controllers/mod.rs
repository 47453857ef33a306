//! Controllers for the Pinot Kubernetes Operator
//!
//! Each controller watches its CRD and reconciles the actual state with the
//! desired state. Every pass, successful or not, requeues after the
//! configured wait.

mod cluster;
mod resource;
mod table;

pub use cluster::{cluster_status, PinotController};
pub use resource::ResourceController;
pub use table::{tables_to_reload, SchemaReloadWatcher, SchemaUpdateTracker, TableReloader};

use crate::config::OperatorConfig;
use crate::error::OperatorError;
use futures::Stream;
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::runtime::controller::Action;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{predicates, watcher, WatchStreamExt};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{error, warn};

/// Requeue after a failed reconcile. Transient errors are expected and
/// logged at warn; anything else needs a human.
pub fn error_policy_backoff(error: &OperatorError, wait: Duration) -> Action {
    if error.is_transient() {
        warn!(error = %error, "Reconciliation will be retried");
    } else {
        error!(error = %error, "Reconciliation failed");
    }
    Action::requeue(wait)
}

/// Event filter applied before every reconcile.
///
/// Skips documents whose `annotation` is `"false"` and documents in a
/// denied namespace.
pub fn should_reconcile<K: Resource>(obj: &K, annotation: &str, config: &OperatorConfig) -> bool {
    if obj
        .annotations()
        .get(annotation)
        .is_some_and(|v| v.eq_ignore_ascii_case("false"))
    {
        return false;
    }
    !config.is_denied(&obj.namespace().unwrap_or_default())
}

/// Api scoped to the watched namespace, or to all namespaces.
pub(crate) fn watch_api<K>(client: &Client, config: &OperatorConfig) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match &config.watch_namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Trigger stream for a controller's primary kind.
///
/// Only spec changes (a new `metadata.generation`) pass; status writes made
/// by the controller itself do not re-trigger it. The returned store is
/// populated from the same watch.
pub(crate) fn generation_changes<K>(
    api: Api<K>,
) -> (
    impl Stream<Item = Result<K, watcher::Error>> + Send + 'static,
    Store<K>,
)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation);
    (stream, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PinotSchema, PinotSchemaSpec};

    fn schema(namespace: &str) -> PinotSchema {
        let mut obj = PinotSchema::new(
            "s1",
            PinotSchemaSpec {
                pinot_cluster: "c1".to_string(),
                schema_json: "{}".to_string(),
            },
        );
        obj.metadata.namespace = Some(namespace.to_string());
        obj
    }

    const ANNOTATION: &str = "pinotschema.datainfra.io/reconcile";

    #[test]
    fn test_should_reconcile_by_default() {
        assert!(should_reconcile(
            &schema("pinot"),
            ANNOTATION,
            &OperatorConfig::default()
        ));
    }

    #[test]
    fn test_ignore_annotation() {
        let mut obj = schema("pinot");
        obj.annotations_mut()
            .insert(ANNOTATION.to_string(), "false".to_string());
        assert!(!should_reconcile(&obj, ANNOTATION, &OperatorConfig::default()));

        obj.annotations_mut()
            .insert(ANNOTATION.to_string(), "true".to_string());
        assert!(should_reconcile(&obj, ANNOTATION, &OperatorConfig::default()));
    }

    #[test]
    fn test_deny_list() {
        let config = OperatorConfig {
            deny_list: vec!["kube-system".to_string()],
            ..Default::default()
        };
        assert!(!should_reconcile(&schema("kube-system"), ANNOTATION, &config));
        assert!(should_reconcile(&schema("pinot"), ANNOTATION, &config));
    }

    #[test]
    fn test_error_policy_requeues_with_wait() {
        let wait = Duration::from_secs(10);
        assert_eq!(
            error_policy_backoff(&OperatorError::Http("timeout".to_string()), wait),
            Action::requeue(wait)
        );
        assert_eq!(
            error_policy_backoff(&OperatorError::NodeTypeNotOrdered("minion".to_string()), wait),
            Action::requeue(wait)
        );
    }
}
