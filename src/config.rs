//! Runtime configuration shared by every controller.

use crate::error::{OperatorError, Result};
use std::time::Duration;

/// Requeue interval when `RECONCILE_WAIT` is not set
pub const DEFAULT_RECONCILE_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Fixed requeue interval after every reconcile, successful or not
    pub reconcile_wait: Duration,
    /// Namespaces whose documents are never reconciled
    pub deny_list: Vec<String>,
    /// Restrict watches to one namespace (all namespaces when `None`)
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            reconcile_wait: DEFAULT_RECONCILE_WAIT,
            deny_list: Vec::new(),
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    /// Build from the raw `RECONCILE_WAIT` and `DENY_LIST` values.
    ///
    /// A malformed wait is an error; the operator refuses to start with it.
    pub fn from_raw(
        reconcile_wait: Option<&str>,
        deny_list: Option<&str>,
        watch_namespace: Option<String>,
    ) -> Result<Self> {
        let reconcile_wait = match reconcile_wait.map(str::trim) {
            None | Some("") => DEFAULT_RECONCILE_WAIT,
            Some(raw) => humantime::parse_duration(raw).map_err(|e| {
                OperatorError::Configuration(format!("invalid RECONCILE_WAIT '{}': {}", raw, e))
            })?,
        };

        Ok(Self {
            reconcile_wait,
            deny_list: deny_list.map(parse_deny_list).unwrap_or_default(),
            watch_namespace,
        })
    }

    pub fn is_denied(&self, namespace: &str) -> bool {
        self.deny_list.iter().any(|ns| ns == namespace)
    }
}

/// Comma separated namespace list; blanks are dropped.
pub fn parse_deny_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}
