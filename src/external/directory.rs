use super::ClusterDirectory;
use crate::admin::{AdminTarget, BasicAuth};
use crate::crd::{NodeType, Pinot};
use crate::error::{OperatorError, Result};
use crate::labels;
use crate::topology::profile;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::debug;

/// Resolves controller endpoints and credentials from the cluster's own objects
pub struct KubeClusterDirectory {
    client: Client,
}

impl KubeClusterDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn credentials(&self, namespace: &str, cluster: &str) -> Result<Option<BasicAuth>> {
        let pinots: Api<Pinot> = Api::namespaced(self.client.clone(), namespace);
        let Some(pinot) = pinots.get_opt(cluster).await? else {
            return Ok(None);
        };
        let Some(auth) = pinot.spec.auth else {
            return Ok(None);
        };

        let secret_namespace = auth.namespace.as_deref().unwrap_or(namespace);
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), secret_namespace);
        let secret = secrets.get(&auth.secret_name).await?;
        basic_auth_from_secret(&secret).map(Some)
    }
}

#[async_trait]
impl ClusterDirectory for KubeClusterDirectory {
    async fn resolve(&self, namespace: &str, cluster: &str) -> Result<AdminTarget> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = services
            .list(&ListParams::default().labels(&labels::controller_selector(cluster)))
            .await?;

        let service = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| OperatorError::EndpointNotFound {
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
            })?;

        let base_url = controller_base_url(&service, namespace);
        debug!(cluster, base_url = %base_url, "Resolved Pinot controller");

        Ok(AdminTarget {
            base_url,
            auth: self.credentials(namespace, cluster).await?,
        })
    }

    async fn cluster_exists(&self, namespace: &str, cluster: &str) -> Result<bool> {
        let pinots: Api<Pinot> = Api::namespaced(self.client.clone(), namespace);
        Ok(pinots.get_opt(cluster).await?.is_some())
    }
}

/// `http://<svc>.<ns>.svc.cluster.local:<port>`; the port named `controller`
/// wins, then the first declared port, then the controller default.
pub fn controller_base_url(service: &Service, namespace: &str) -> String {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.clone())
        .unwrap_or_default();
    let port = ports
        .iter()
        .find(|p| p.name.as_deref() == Some(NodeType::Controller.as_str()))
        .or_else(|| ports.first())
        .map(|p| p.port)
        .unwrap_or(profile(NodeType::Controller).default_port);

    format!(
        "http://{}.{}.svc.cluster.local:{}",
        service.name_any(),
        namespace,
        port
    )
}

/// Read `username` and `password` from a basic-auth secret.
pub fn basic_auth_from_secret(secret: &Secret) -> Result<BasicAuth> {
    let field = |key: &str| -> Result<String> {
        let bytes = secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .ok_or_else(|| {
                OperatorError::Configuration(format!(
                    "secret {} has no '{}' key",
                    secret.name_any(),
                    key
                ))
            })?;
        String::from_utf8(bytes.0.clone()).map_err(|_| {
            OperatorError::Configuration(format!(
                "secret {} key '{}' is not UTF-8",
                secret.name_any(),
                key
            ))
        })
    };

    Ok(BasicAuth {
        username: field("username")?,
        password: field("password")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn service(ports: Vec<(&str, i32)>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("pinot-controller-ctrl-svc".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .into_iter()
                        .map(|(name, port)| ServicePort {
                            name: Some(name.to_string()),
                            port,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url_prefers_named_port() {
        let svc = service(vec![("metrics", 8008), ("controller", 9443)]);
        assert_eq!(
            controller_base_url(&svc, "ns"),
            "http://pinot-controller-ctrl-svc.ns.svc.cluster.local:9443"
        );
    }

    #[test]
    fn test_base_url_falls_back_to_default_port() {
        let svc = service(vec![]);
        assert!(controller_base_url(&svc, "ns").ends_with(":9000"));
        let svc = service(vec![("http", 8080)]);
        assert!(controller_base_url(&svc, "ns").ends_with(":8080"));
    }

    #[test]
    fn test_basic_auth_from_secret() {
        let mut data = BTreeMap::new();
        data.insert("username".to_string(), ByteString(b"admin".to_vec()));
        data.insert("password".to_string(), ByteString(b"verysecret".to_vec()));
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("pinot-auth".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };

        let auth = basic_auth_from_secret(&secret).unwrap();
        assert_eq!(auth.username, "admin");
        assert_eq!(auth.password, "verysecret");
    }

    #[test]
    fn test_basic_auth_missing_key() {
        let secret = Secret::default();
        assert!(matches!(
            basic_auth_from_secret(&secret),
            Err(OperatorError::Configuration(_))
        ));
    }
}
