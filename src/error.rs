//! Error types for the Pinot Kubernetes Operator

use std::fmt;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    KubeApi(String),
    /// Optimistic-concurrency conflict on a write (HTTP 409)
    Conflict(String),
    /// Configuration error in a user document
    Configuration(String),
    /// A node references a config group that is not declared
    ConfigurationNotFound {
        /// Kind of group (`k8sConfig` or `pinotNodeConfig`)
        group_kind: &'static str,
        /// Referenced group name
        name: String,
    },
    /// A node type is used but not listed in `deploymentOrder`
    NodeTypeNotOrdered(String),
    /// The embedded JSON document is malformed or lacks its identity field
    InvalidDocument(String),
    /// No controller service found for the cluster yet
    EndpointNotFound {
        /// Namespace searched
        namespace: String,
        /// Owning Pinot cluster name
        cluster: String,
    },
    /// HTTP transport error talking to the Pinot controller
    Http(String),
    /// Serialization error
    Serialization(String),
    /// Resource not found
    NotFound(String),
}

impl OperatorError {
    /// Whether the error is expected to clear on its own and should simply be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeApi(_)
                | OperatorError::Conflict(_)
                | OperatorError::EndpointNotFound { .. }
                | OperatorError::Http(_)
                | OperatorError::NotFound(_)
        )
    }
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::KubeApi(msg) => write!(f, "Kubernetes API error: {}", msg),
            OperatorError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            OperatorError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OperatorError::ConfigurationNotFound { group_kind, name } => {
                write!(f, "Configuration not found: {} group '{}'", group_kind, name)
            }
            OperatorError::NodeTypeNotOrdered(node_type) => write!(
                f,
                "Configuration error: node type '{}' is not listed in deploymentOrder",
                node_type
            ),
            OperatorError::InvalidDocument(msg) => write!(f, "Invalid document: {}", msg),
            OperatorError::EndpointNotFound { namespace, cluster } => write!(
                f,
                "No controller endpoint found for cluster {}/{}",
                namespace, cluster
            ),
            OperatorError::Http(msg) => write!(f, "HTTP error: {}", msg),
            OperatorError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OperatorError::NotFound(msg) => write!(f, "Resource not found: {}", msg),
        }
    }
}

impl std::error::Error for OperatorError {}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => OperatorError::Conflict(ae.message),
            kube::Error::Api(ae) if ae.code == 404 => OperatorError::NotFound(ae.message),
            other => OperatorError::KubeApi(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for OperatorError {
    fn from(err: reqwest::Error) -> Self {
        OperatorError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OperatorError::KubeApi("test error".to_string());
        assert!(err.to_string().contains("Kubernetes API error"));

        let err = OperatorError::ConfigurationNotFound {
            group_kind: "pinotNodeConfig",
            name: "g1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration not found: pinotNodeConfig group 'g1'"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(OperatorError::Conflict("rv".to_string()).is_transient());
        assert!(OperatorError::Http("timeout".to_string()).is_transient());
        assert!(OperatorError::EndpointNotFound {
            namespace: "ns".to_string(),
            cluster: "c1".to_string(),
        }
        .is_transient());

        assert!(!OperatorError::InvalidDocument("no schemaName".to_string()).is_transient());
        assert!(!OperatorError::NodeTypeNotOrdered("minion".to_string()).is_transient());
        assert!(!OperatorError::Configuration("bad".to_string()).is_transient());
    }
}
