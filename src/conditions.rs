//! Status condition helpers
//!
//! Condition types, finalizers and builders shared by the cluster and the
//! logical-resource controllers.

use crate::crd::LogicalResourceStatus;
use chrono::Utc;
use std::fmt;

// Condition status values
pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

// Pinot cluster condition types
pub const CLUSTER_CONDITION_READY: &str = "Ready";
pub const CLUSTER_CONDITION_CONFIGURED: &str = "Configured";

// Finalizer names
pub const SCHEMA_FINALIZER: &str = "pinotschema.datainfra.io/finalizer";
pub const TABLE_FINALIZER: &str = "pinottable.datainfra.io/finalizer";
pub const TENANT_FINALIZER: &str = "pinottenant.datainfra.io/finalizer";

/// Outcome tag recorded on schemas, tables and tenants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    CreateSuccess,
    CreateFail,
    UpdateSuccess,
    UpdateFail,
    DeleteSuccess,
    DeleteFail,
    GetFail,
    InvalidSpec,
    ReloadSuccess,
    ReloadFail,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::CreateSuccess => "CreateSuccess",
            ConditionType::CreateFail => "CreateFail",
            ConditionType::UpdateSuccess => "UpdateSuccess",
            ConditionType::UpdateFail => "UpdateFail",
            ConditionType::DeleteSuccess => "DeleteSuccess",
            ConditionType::DeleteFail => "DeleteFail",
            ConditionType::GetFail => "GetFail",
            ConditionType::InvalidSpec => "InvalidSpec",
            ConditionType::ReloadSuccess => "ReloadSuccess",
            ConditionType::ReloadFail => "ReloadFail",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ConditionType::CreateSuccess
                | ConditionType::UpdateSuccess
                | ConditionType::DeleteSuccess
                | ConditionType::ReloadSuccess
        )
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record an outcome on a logical resource's status.
///
/// `lastAppliedJson` is left untouched; callers set it only on success.
pub fn set_outcome(status: &mut LogicalResourceStatus, condition: ConditionType, message: &str) {
    status.r#type = Some(condition.to_string());
    status.status = Some(
        if condition.is_success() {
            CONDITION_TRUE
        } else {
            CONDITION_FALSE
        }
        .to_string(),
    );
    status.reason = Some(condition.to_string());
    status.message = Some(message.to_string());
    status.last_update_time = Some(Utc::now().to_rfc3339());
}

/// Build a condition with the current timestamp.
pub fn build_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> ConditionFields {
    ConditionFields {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

/// Generic condition fields, converted into the cluster's condition type.
#[derive(Debug, Clone)]
pub struct ConditionFields {
    pub condition_type: String,
    pub status: String,
    pub last_transition_time: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ConditionFields {
    pub fn into_cluster_condition(self) -> crate::crd::ClusterCondition {
        crate::crd::ClusterCondition {
            r#type: self.condition_type,
            status: self.status,
            last_transition_time: self.last_transition_time,
            reason: self.reason,
            message: self.message,
        }
    }
}

impl From<crate::crd::ClusterCondition> for ConditionFields {
    fn from(c: crate::crd::ClusterCondition) -> Self {
        ConditionFields {
            condition_type: c.r#type,
            status: c.status,
            last_transition_time: c.last_transition_time,
            reason: c.reason,
            message: c.message,
        }
    }
}

/// Set or update a condition in a list, preserving lastTransitionTime when status hasn't changed.
pub fn set_condition(conditions: &mut Vec<ConditionFields>, new: ConditionFields) {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == new.condition_type)
    {
        if existing.status != new.status {
            *existing = new;
        } else {
            existing.reason = new.reason;
            existing.message = new.message;
        }
    } else {
        conditions.push(new);
    }
}
