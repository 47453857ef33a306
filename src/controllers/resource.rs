//! Logical Resource Controller
//!
//! One instance per kind (schemas, tables, tenants). The controller only
//! filters and schedules; the protocol with the Pinot controller lives in
//! [`ExternalReconciler`].

use super::{error_policy_backoff, generation_changes, should_reconcile, watch_api};
use crate::admin::AdminApi;
use crate::config::OperatorConfig;
use crate::error::{OperatorError, Result};
use crate::events::KubeEventPublisher;
use crate::external::{ExternalReconciler, KubeClusterDirectory, KubeResourceStore, LogicalResource, Outcome};
use futures::StreamExt;
use kube::runtime::controller::{Action, Controller};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Context for a logical-resource controller
pub struct ResourceController<K> {
    client: Client,
    config: OperatorConfig,
    reconciler: ExternalReconciler<K>,
}

impl<K: LogicalResource> ResourceController<K> {
    pub fn new(client: Client, config: OperatorConfig, admin: Arc<dyn AdminApi>) -> Self {
        let reconciler = ExternalReconciler::new(
            admin,
            Arc::new(KubeResourceStore::<K>::new(client.clone())),
            Arc::new(KubeClusterDirectory::new(client.clone())),
            Arc::new(KubeEventPublisher::new(
                client.clone(),
                &format!("{}-controller", K::KIND),
            )),
        );
        Self {
            client,
            config,
            reconciler,
        }
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let (documents, reader) = generation_changes(watch_api::<K>(&self.client, &self.config));

        info!(kind = K::KIND, "Starting controller");

        Controller::for_stream(documents, reader)
            .shutdown_on_signal()
            .run(
                |obj, ctx| async move { ctx.reconcile(obj).await },
                |_obj, error, ctx| error_policy_backoff(error, ctx.config.reconcile_wait),
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!(kind = K::KIND, name = %obj.name, "Reconciled");
                    }
                    Err(e) => {
                        error!(kind = K::KIND, "Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn reconcile(&self, obj: Arc<K>) -> std::result::Result<Action, OperatorError> {
        let wait = self.config.reconcile_wait;

        if !should_reconcile(obj.as_ref(), &K::reconcile_annotation(), &self.config) {
            debug!(kind = K::KIND, name = %obj.name_any(), "Skipping filtered document");
            return Ok(Action::requeue(wait));
        }

        let outcome = self.reconciler.reconcile(obj.as_ref()).await?;
        info!(
            kind = K::KIND,
            name = %obj.name_any(),
            namespace = ?obj.namespace(),
            outcome = ?outcome,
            "Reconciled document"
        );
        Ok(next_action(outcome, wait))
    }
}

/// Documents on their way out are not requeued; everything else is
/// revisited after `wait` to catch drift made directly in Pinot.
pub fn next_action(outcome: Outcome, wait: Duration) -> Action {
    match outcome {
        Outcome::Deleted | Outcome::DeleteFailed | Outcome::Released | Outcome::Gone => {
            Action::await_change()
        }
        _ => Action::requeue(wait),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_action() {
        let wait = Duration::from_secs(10);
        assert_eq!(next_action(Outcome::Created, wait), Action::requeue(wait));
        assert_eq!(next_action(Outcome::UpdateFailed, wait), Action::requeue(wait));
        assert_eq!(next_action(Outcome::InvalidSpec, wait), Action::requeue(wait));
        assert_eq!(next_action(Outcome::Deleted, wait), Action::await_change());
        assert_eq!(next_action(Outcome::Gone, wait), Action::await_change());
    }
}
