use super::{LogicalResource, ResourceStore};
use crate::crd::LogicalResourceStatus;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::marker::PhantomData;
use tracing::debug;

/// Status and finalizer writes against the API server
pub struct KubeResourceStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeResourceStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K: LogicalResource> KubeResourceStore<K> {
    fn api(&self, obj: &K) -> Api<K> {
        Api::namespaced(
            self.client.clone(),
            &obj.namespace().unwrap_or_else(|| "default".to_string()),
        )
    }

    async fn patch_finalizers(&self, obj: &K, finalizers: Vec<String>) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.api(obj)
            .patch(
                &obj.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<K: LogicalResource> ResourceStore<K> for KubeResourceStore<K> {
    /// Read the latest object, transform its status and replace it under the
    /// read `resourceVersion`. A conflict is retried once.
    async fn update_status(
        &self,
        obj: &K,
        transform: &(dyn for<'s> Fn(&'s mut LogicalResourceStatus) + Send + Sync),
    ) -> Result<()> {
        let api = self.api(obj);
        let name = obj.name_any();

        for attempt in 0..2 {
            let mut latest = api.get_status(&name).await?;
            let mut status = latest.admin_status().cloned().unwrap_or_default();
            transform(&mut status);
            *latest.admin_status_mut() = Some(status);

            let data = serde_json::to_vec(&latest)?;
            match api
                .replace_status(&name, &PostParams::default(), data)
                .await
            {
                Ok(_) => return Ok(()),
                Err(kube::Error::Api(ae)) if ae.code == 409 && attempt == 0 => {
                    debug!(kind = K::KIND, name = %name, "Status conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OperatorError::Conflict(format!(
            "status of {} {} changed concurrently",
            K::KIND,
            name
        )))
    }

    async fn add_finalizer(&self, obj: &K) -> Result<()> {
        let mut finalizers = obj.finalizers().to_vec();
        if finalizers.iter().any(|f| f == K::FINALIZER) {
            return Ok(());
        }
        finalizers.push(K::FINALIZER.to_string());
        debug!(kind = K::KIND, name = %obj.name_any(), "Adding finalizer");
        self.patch_finalizers(obj, finalizers).await
    }

    async fn remove_finalizer(&self, obj: &K) -> Result<()> {
        let finalizers: Vec<String> = obj
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != K::FINALIZER)
            .cloned()
            .collect();
        debug!(kind = K::KIND, name = %obj.name_any(), "Removing finalizer");
        self.patch_finalizers(obj, finalizers).await
    }
}
