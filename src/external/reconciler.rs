use super::{
    documents_equal, has_finalizer, lifecycle, parse_document, ClusterDirectory, Lifecycle,
    LogicalResource, Outcome, ResourceStore,
};
use crate::admin::{AdminApi, AdminResponse, AdminTarget, ProbeOutcome};
use crate::conditions::{set_outcome, ConditionType};
use crate::crd::LogicalResourceStatus;
use crate::error::Result;
use crate::events::{actions, EventPublisher};
use kube::runtime::events::EventType;
use kube::ResourceExt;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one logical-resource kind into agreement with the Pinot controller
pub struct ExternalReconciler<K> {
    admin: Arc<dyn AdminApi>,
    store: Arc<dyn ResourceStore<K>>,
    directory: Arc<dyn ClusterDirectory>,
    events: Arc<dyn EventPublisher>,
}

impl<K: LogicalResource> ExternalReconciler<K> {
    pub fn new(
        admin: Arc<dyn AdminApi>,
        store: Arc<dyn ResourceStore<K>>,
        directory: Arc<dyn ClusterDirectory>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            admin,
            store,
            directory,
            events,
        }
    }

    /// One pass over `obj`.
    ///
    /// Outside deletion, transport failures and a missing controller endpoint
    /// are returned as errors and leave the status untouched. Everything the controller
    /// answers is captured in the status and an event instead.
    pub async fn reconcile(&self, obj: &K) -> Result<Outcome> {
        match lifecycle(obj, K::FINALIZER) {
            Lifecycle::Gone => Ok(Outcome::Gone),
            Lifecycle::Deleting => self.finalize(obj).await,
            Lifecycle::Active => self.apply(obj).await,
        }
    }

    async fn apply(&self, obj: &K) -> Result<Outcome> {
        let namespace = obj.namespace().unwrap_or_default();
        let target = self.directory.resolve(&namespace, obj.cluster_name()).await?;

        let (identity, desired) = match parse_document(obj.document(), K::IDENTITY_FIELD) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(kind = K::KIND, name = %obj.name_any(), error = %e, "Invalid document");
                self.record(obj, ConditionType::InvalidSpec, &e.to_string(), None)
                    .await?;
                return Ok(Outcome::InvalidSpec);
            }
        };

        let outcome = self.converge(obj, &target, &identity, &desired).await?;

        let remote_exists = matches!(
            outcome,
            Outcome::Created | Outcome::InSync | Outcome::Updated | Outcome::UpdateFailed
        );
        if remote_exists && !has_finalizer(obj, K::FINALIZER) {
            self.store.add_finalizer(obj).await?;
        }

        Ok(outcome)
    }

    async fn converge(
        &self,
        obj: &K,
        target: &AdminTarget,
        identity: &str,
        desired: &Value,
    ) -> Result<Outcome> {
        let response = self
            .admin
            .send(target.request(Method::GET, &obj.probe_path(identity), None))
            .await?;

        match obj.interpret_probe(identity, ProbeOutcome::from_response(response)) {
            ProbeOutcome::Failed(response) => {
                warn!(
                    kind = K::KIND,
                    name = %obj.name_any(),
                    status = response.status,
                    "Unexpected probe response"
                );
                self.publish(obj, ConditionType::GetFail, actions::GET, &response)
                    .await;
                Ok(Outcome::ProbeFailed)
            }
            ProbeOutcome::Absent => self.create(obj, target, desired).await,
            ProbeOutcome::Present(remote) => {
                let mut last_applied = obj
                    .admin_status()
                    .and_then(|s| s.last_applied_json.clone());

                if last_applied.is_none() {
                    if let Some(remote) = remote {
                        let adopted = remote.to_string();
                        info!(kind = K::KIND, name = %obj.name_any(), "Adopting existing remote document");
                        let applied = adopted.clone();
                        self.store
                            .update_status(obj, &move |s: &mut LogicalResourceStatus| {
                                s.last_applied_json = Some(applied.clone());
                            })
                            .await?;
                        last_applied = Some(adopted);
                    }
                }

                if last_applied
                    .as_deref()
                    .is_some_and(|applied| documents_equal(applied, desired))
                {
                    debug!(kind = K::KIND, name = %obj.name_any(), "In sync");
                    return Ok(Outcome::InSync);
                }

                self.update(obj, target, identity, desired).await
            }
        }
    }

    async fn create(&self, obj: &K, target: &AdminTarget, desired: &Value) -> Result<Outcome> {
        let (method, path) = obj.create_route();
        let response = self
            .admin
            .send(target.request(method, &path, Some(obj.document().to_string())))
            .await?;

        if response.is_ok() {
            info!(kind = K::KIND, name = %obj.name_any(), "Created in Pinot");
            self.record(obj, ConditionType::CreateSuccess, &response.body, Some(desired))
                .await?;
            self.publish(obj, ConditionType::CreateSuccess, actions::CREATE, &response)
                .await;
            Ok(Outcome::Created)
        } else {
            warn!(kind = K::KIND, name = %obj.name_any(), status = response.status, "Create failed");
            self.record(obj, ConditionType::CreateFail, &response.body, None)
                .await?;
            self.publish(obj, ConditionType::CreateFail, actions::CREATE, &response)
                .await;
            Ok(Outcome::CreateFailed)
        }
    }

    async fn update(
        &self,
        obj: &K,
        target: &AdminTarget,
        identity: &str,
        desired: &Value,
    ) -> Result<Outcome> {
        let (method, path) = obj.update_route(identity);
        let response = self
            .admin
            .send(target.request(method, &path, Some(obj.document().to_string())))
            .await?;

        if response.is_ok() {
            info!(kind = K::KIND, name = %obj.name_any(), "Updated in Pinot");
            self.record(obj, ConditionType::UpdateSuccess, &response.body, Some(desired))
                .await?;
            self.publish(obj, ConditionType::UpdateSuccess, actions::UPDATE, &response)
                .await;
            Ok(Outcome::Updated)
        } else {
            warn!(kind = K::KIND, name = %obj.name_any(), status = response.status, "Update failed");
            self.record(obj, ConditionType::UpdateFail, &response.body, None)
                .await?;
            self.publish(obj, ConditionType::UpdateFail, actions::UPDATE, &response)
                .await;
            Ok(Outcome::UpdateFailed)
        }
    }

    /// Delete the remote object once, then release the finalizer whatever
    /// the controller answered.
    async fn finalize(&self, obj: &K) -> Result<Outcome> {
        let namespace = obj.namespace().unwrap_or_default();
        let cluster = obj.cluster_name();

        if !self.directory.cluster_exists(&namespace, cluster).await? {
            warn!(kind = K::KIND, name = %obj.name_any(), cluster, "Owning cluster is gone, releasing finalizer");
            self.events
                .publish(
                    &obj.object_ref(&()),
                    EventType::Warning,
                    ConditionType::DeleteFail.as_str(),
                    actions::DELETE,
                    Some(format!("Pinot cluster {} no longer exists", cluster)),
                )
                .await;
            self.store.remove_finalizer(obj).await?;
            return Ok(Outcome::Released);
        }

        let target = match self.directory.resolve(&namespace, cluster).await {
            Ok(target) => target,
            Err(e) => return self.abandon_delete(obj, &e.to_string()).await,
        };
        let identity = match parse_document(obj.document(), K::IDENTITY_FIELD) {
            Ok((identity, _)) => identity,
            Err(e) => {
                warn!(kind = K::KIND, name = %obj.name_any(), error = %e, "Cannot delete remote object with an invalid document");
                self.events
                    .publish(
                        &obj.object_ref(&()),
                        EventType::Warning,
                        ConditionType::InvalidSpec.as_str(),
                        actions::DELETE,
                        Some(e.to_string()),
                    )
                    .await;
                self.store.remove_finalizer(obj).await?;
                return Ok(Outcome::Released);
            }
        };

        let response = match self
            .admin
            .send(target.request(Method::DELETE, &obj.delete_path(&identity), None))
            .await
        {
            Ok(response) => response,
            Err(e) => return self.abandon_delete(obj, &e.to_string()).await,
        };

        let outcome = if response.is_ok() || response.status == 404 {
            info!(kind = K::KIND, name = %obj.name_any(), "Deleted from Pinot");
            self.publish(obj, ConditionType::DeleteSuccess, actions::DELETE, &response)
                .await;
            Outcome::Deleted
        } else {
            warn!(kind = K::KIND, name = %obj.name_any(), status = response.status, "Delete failed, releasing finalizer anyway");
            self.publish(obj, ConditionType::DeleteFail, actions::DELETE, &response)
                .await;
            Outcome::DeleteFailed
        };

        self.store.remove_finalizer(obj).await?;
        Ok(outcome)
    }

    /// The delete could not be issued; warn and release the finalizer anyway.
    async fn abandon_delete(&self, obj: &K, reason: &str) -> Result<Outcome> {
        warn!(kind = K::KIND, name = %obj.name_any(), error = %reason, "Delete not sent, releasing finalizer anyway");
        self.events
            .publish(
                &obj.object_ref(&()),
                EventType::Warning,
                ConditionType::DeleteFail.as_str(),
                actions::DELETE,
                Some(reason.to_string()),
            )
            .await;
        self.store.remove_finalizer(obj).await?;
        Ok(Outcome::DeleteFailed)
    }

    /// Write an outcome to the status; `applied` also replaces `lastAppliedJson`.
    /// A repeated failure already on record is not written again.
    async fn record(
        &self,
        obj: &K,
        condition: ConditionType,
        message: &str,
        applied: Option<&Value>,
    ) -> Result<()> {
        let repeated = applied.is_none()
            && obj.admin_status().is_some_and(|s| {
                s.r#type.as_deref() == Some(condition.as_str())
                    && s.message.as_deref() == Some(message)
            });
        if repeated {
            debug!(kind = K::KIND, name = %obj.name_any(), condition = %condition, "Outcome already recorded");
            return Ok(());
        }

        let message = message.to_string();
        let applied = applied.map(Value::to_string);
        self.store
            .update_status(obj, &move |s: &mut LogicalResourceStatus| {
                if let Some(applied) = &applied {
                    s.last_applied_json = Some(applied.clone());
                }
                set_outcome(s, condition, &message);
            })
            .await
    }

    async fn publish(
        &self,
        obj: &K,
        condition: ConditionType,
        action: &str,
        response: &AdminResponse,
    ) {
        let type_ = if condition.is_success() {
            EventType::Normal
        } else {
            EventType::Warning
        };
        self.events
            .publish(
                &obj.object_ref(&()),
                type_,
                condition.as_str(),
                action,
                Some(format!("Resp [{}]", response.body)),
            )
            .await;
    }
}
