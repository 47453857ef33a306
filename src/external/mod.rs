//! Reconciliation of logical resources held by the Pinot controller
//!
//! Schemas, tables and tenants live inside Pinot, not Kubernetes. Each kind
//! implements [`LogicalResource`] to describe its routes and identity; one
//! generic [`ExternalReconciler`] drives all three through probe, create,
//! diff, update and delete.

mod directory;
mod kinds;
mod reconciler;
mod store;

pub use directory::{basic_auth_from_secret, controller_base_url, KubeClusterDirectory};
pub use reconciler::ExternalReconciler;
pub use store::KubeResourceStore;

use crate::admin::{AdminTarget, ProbeOutcome};
use crate::crd::LogicalResourceStatus;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// A Kubernetes document mirroring one object in the Pinot controller
pub trait LogicalResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Lowercase kind, e.g. `pinotschema`
    const KIND: &'static str;
    /// Field of the embedded JSON naming the remote object
    const IDENTITY_FIELD: &'static str;
    const FINALIZER: &'static str;

    fn cluster_name(&self) -> &str;

    /// Embedded JSON document, verbatim
    fn document(&self) -> &str;

    fn admin_status(&self) -> Option<&LogicalResourceStatus>;
    fn admin_status_mut(&mut self) -> &mut Option<LogicalResourceStatus>;

    fn probe_path(&self, identity: &str) -> String;
    fn create_route(&self) -> (Method, String);
    fn update_route(&self, identity: &str) -> (Method, String);
    fn delete_path(&self, identity: &str) -> String;

    /// Narrow a normalized probe to this kind's remote document.
    fn interpret_probe(&self, _identity: &str, outcome: ProbeOutcome) -> ProbeOutcome {
        outcome
    }

    /// Annotation that disables reconciliation when set to `"false"`
    fn reconcile_annotation() -> String {
        format!("{}.datainfra.io/reconcile", Self::KIND)
    }
}

/// Where a document stands with respect to deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Deletion requested, our finalizer still holds it
    Deleting,
    /// Deletion requested and nothing left for us to do
    Gone,
}

pub fn lifecycle<K: Resource>(obj: &K, finalizer: &str) -> Lifecycle {
    match (obj.meta().deletion_timestamp.is_some(), has_finalizer(obj, finalizer)) {
        (false, _) => Lifecycle::Active,
        (true, true) => Lifecycle::Deleting,
        (true, false) => Lifecycle::Gone,
    }
}

pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == finalizer))
}

/// What one reconcile pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    CreateFailed,
    /// Remote document already matches
    InSync,
    Updated,
    UpdateFailed,
    /// Existence probe returned an unexpected status
    ProbeFailed,
    InvalidSpec,
    Deleted,
    DeleteFailed,
    /// Finalizer released without a remote call
    Released,
    /// Nothing to do
    Gone,
}

/// Parse the embedded document and pull out its identity.
pub fn parse_document(document: &str, identity_field: &str) -> Result<(String, Value)> {
    let value: Value = serde_json::from_str(document)
        .map_err(|e| OperatorError::InvalidDocument(e.to_string()))?;
    let identity = value
        .get(identity_field)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            OperatorError::InvalidDocument(format!("missing string field '{}'", identity_field))
        })?
        .to_string();
    Ok((identity, value))
}

/// Structural equality: key order and whitespace are ignored.
pub fn documents_equal(last_applied: &str, desired: &Value) -> bool {
    serde_json::from_str::<Value>(last_applied)
        .map(|applied| &applied == desired)
        .unwrap_or(false)
}

/// Persistence seam for logical-resource documents
#[async_trait]
pub trait ResourceStore<K>: Send + Sync {
    /// Apply `transform` to the latest stored status and write it back.
    async fn update_status(
        &self,
        obj: &K,
        transform: &(dyn for<'s> Fn(&'s mut LogicalResourceStatus) + Send + Sync),
    ) -> Result<()>;

    async fn add_finalizer(&self, obj: &K) -> Result<()>;

    async fn remove_finalizer(&self, obj: &K) -> Result<()>;
}

/// Lookup seam for the owning Pinot cluster
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Controller endpoint and credentials; `EndpointNotFound` until the
    /// controller service exists.
    async fn resolve(&self, namespace: &str, cluster: &str) -> Result<AdminTarget>;

    async fn cluster_exists(&self, namespace: &str, cluster: &str) -> Result<bool>;
}
