//! Pinot controller admin API
//!
//! A thin request/response seam over the controller's REST API. The
//! reconcilers build [`AdminRequest`]s from [`routes`] and interpret the raw
//! [`AdminResponse`]; only [`HttpAdminClient`] touches the network.

pub mod routes;

use crate::error::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP Basic credentials read from the cluster's auth secret
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved controller endpoint of one Pinot cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminTarget {
    /// e.g. `http://pinot-controller-svc.ns.svc.cluster.local:9000`
    pub base_url: String,
    pub auth: Option<BasicAuth>,
}

impl AdminTarget {
    pub fn request(&self, method: Method, path: &str, body: Option<String>) -> AdminRequest {
        AdminRequest {
            method,
            url: format!("{}{}", self.base_url.trim_end_matches('/'), path),
            body,
            auth: self.auth.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
    pub auth: Option<BasicAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: String,
}

impl AdminResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// 404, or a 200 whose body is an empty JSON object.
    pub fn is_absent(&self) -> bool {
        match self.status {
            404 => true,
            200 => matches!(
                serde_json::from_str::<Value>(&self.body),
                Ok(Value::Object(ref map)) if map.is_empty()
            ),
            _ => false,
        }
    }
}

/// Result of an existence probe, after normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Absent,
    /// Present; the remote document when the response carries one
    Present(Option<Value>),
    /// Any other status; the raw response is kept for the audit event
    Failed(AdminResponse),
}

impl ProbeOutcome {
    pub fn from_response(response: AdminResponse) -> Self {
        if response.is_absent() {
            ProbeOutcome::Absent
        } else if response.is_ok() {
            ProbeOutcome::Present(serde_json::from_str(&response.body).ok())
        } else {
            ProbeOutcome::Failed(response)
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Send one request. Non-2xx statuses are returned, not raised; only
    /// transport failures are errors.
    async fn send(&self, request: AdminRequest) -> Result<AdminResponse>;
}

/// Admin client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpAdminClient {
    http: reqwest::Client,
}

impl HttpAdminClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AdminApi for HttpAdminClient {
    async fn send(&self, request: AdminRequest) -> Result<AdminResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(method = %request.method, url = %request.url, status, "Pinot controller call");
        Ok(AdminResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> AdminResponse {
        AdminResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_absent_detection() {
        assert!(response(404, "not found").is_absent());
        assert!(response(200, "{}").is_absent());
        assert!(response(200, " { } ").is_absent());
        assert!(!response(200, r#"{"schemaName":"s1"}"#).is_absent());
        assert!(!response(500, "{}").is_absent());
    }

    #[test]
    fn test_probe_outcome() {
        assert_eq!(
            ProbeOutcome::from_response(response(404, "")),
            ProbeOutcome::Absent
        );
        assert_eq!(
            ProbeOutcome::from_response(response(200, r#"{"a":1}"#)),
            ProbeOutcome::Present(Some(serde_json::json!({"a": 1})))
        );
        assert_eq!(
            ProbeOutcome::from_response(response(200, "not json")),
            ProbeOutcome::Present(None)
        );
        assert!(matches!(
            ProbeOutcome::from_response(response(503, "down")),
            ProbeOutcome::Failed(r) if r.status == 503
        ));
    }

    #[test]
    fn test_target_builds_url_and_carries_auth() {
        let target = AdminTarget {
            base_url: "http://ctrl:9000/".to_string(),
            auth: Some(BasicAuth {
                username: "admin".to_string(),
                password: "secret".to_string(),
            }),
        };
        let request = target.request(Method::GET, &routes::schema("s1"), None);
        assert_eq!(request.url, "http://ctrl:9000/schemas/s1");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.auth.as_ref().unwrap().username, "admin");
        assert!(!format!("{:?}", request).contains("secret"));
    }
}
