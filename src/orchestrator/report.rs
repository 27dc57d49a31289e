// Copyright (c) 2025 - Cowboy AI, Inc.
//! Run Reports

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::backend::BackendError;
use crate::credentials::CredentialError;
use crate::delegation::DelegationError;
use crate::domain::{Region, ResourceKind};
use crate::graph::{NodeId, ResourceNode};
use crate::state_machine::{TransitionError, TransitionOutput};
use crate::validation::{ValidationError, ValidationTimeoutError};

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Apply,
    Teardown,
}

/// Node identity as shown in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub name: String,
    pub kind: ResourceKind,
    pub region: Option<Region>,
}

impl From<&ResourceNode> for NodeRef {
    fn from(node: &ResourceNode) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            kind: node.kind,
            region: node.region.clone(),
        }
    }
}

/// Why a node failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureCause {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    ValidationTimeout(#[from] ValidationTimeoutError),

    #[error(transparent)]
    Validation(ValidationError),

    #[error(transparent)]
    Delegation(DelegationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Missing output {output} from dependency {dependency}")]
    MissingInput { dependency: String, output: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Cancelled")]
    Cancelled,
}

impl FailureCause {
    /// Short machine-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::ValidationTimeout(_) => "validation_timeout",
            Self::Validation(_) => "validation",
            Self::Delegation(_) => "delegation",
            Self::Backend(_) => "backend",
            Self::MissingInput { .. } => "missing_input",
            Self::Transition(_) => "transition",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ValidationError> for FailureCause {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Timeout(timeout) => Self::ValidationTimeout(timeout),
            ValidationError::Cancelled(_) => Self::Cancelled,
            ValidationError::Backend(backend) => Self::Backend(backend),
            other => Self::Validation(other),
        }
    }
}

impl From<DelegationError> for FailureCause {
    fn from(err: DelegationError) -> Self {
        use crate::wait::WaitError;
        match err {
            DelegationError::Credential(credential) => Self::Credential(credential),
            DelegationError::Backend(backend) => Self::Backend(backend),
            DelegationError::Propagation(WaitError::Cancelled(_)) => Self::Cancelled,
            other => Self::Delegation(other),
        }
    }
}

impl Serialize for FailureCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FailureCause", 2)?;
        state.serialize_field("type", self.label())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// A node that ended the run Failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub node: NodeRef,
    pub cause: FailureCause,
}

/// A node that could not start because a dependency failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedNode {
    pub node: NodeRef,
    pub blocked_by: NodeRef,
}

/// Non-fatal note raised by a node's lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeWarning {
    pub node: NodeRef,
    pub message: String,
}

/// Outcome of one apply or teardown run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Nodes finished in this run, in completion order
    pub completed: Vec<NodeRef>,
    /// Nodes already in the target state
    pub skipped: Vec<NodeRef>,
    /// Nodes whose removal policy keeps them on teardown
    pub retained: Vec<NodeRef>,
    pub failures: Vec<NodeFailure>,
    pub blocked: Vec<BlockedNode>,
    /// Transition warnings, such as deleting a Ready resource
    pub warnings: Vec<NodeWarning>,
    /// Nodes left untouched because the run was cancelled
    pub not_started: Vec<NodeRef>,
    pub cancelled: bool,
}

impl RunReport {
    pub(crate) fn start(mode: RunMode) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            completed: Vec::new(),
            skipped: Vec::new(),
            retained: Vec::new(),
            failures: Vec::new(),
            blocked: Vec::new(),
            warnings: Vec::new(),
            not_started: Vec::new(),
            cancelled: false,
        }
    }

    /// Keep the warnings of a non-critical transition
    ///
    /// Critical transitions end a branch and are reported as failures.
    pub(crate) fn note(&mut self, node: Option<&NodeRef>, output: TransitionOutput) {
        let Some(node) = node else {
            return;
        };
        if output.is_critical {
            return;
        }
        self.warnings
            .extend(output.warnings.into_iter().map(|message| NodeWarning {
                node: node.clone(),
                message,
            }));
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Every node reached the target state
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
            && self.blocked.is_empty()
            && self.not_started.is_empty()
            && !self.cancelled
    }

    pub fn completed_names(&self) -> Vec<&str> {
        self.completed.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn skipped_names(&self) -> Vec<&str> {
        self.skipped.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn not_started_names(&self) -> Vec<&str> {
        self.not_started.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn failure_of(&self, name: &str) -> Option<&FailureCause> {
        self.failures
            .iter()
            .find(|f| f.node.name == name)
            .map(|f| &f.cause)
    }

    /// Name of the failed node blocking `name`, if it is blocked
    pub fn blocker_of(&self, name: &str) -> Option<&str> {
        self.blocked
            .iter()
            .find(|b| b.node.name == name)
            .map(|b| b.blocked_by.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationTimeoutError;
    use std::time::Duration;

    #[test]
    fn test_validation_errors_map_to_causes() {
        let timeout = ValidationError::Timeout(ValidationTimeoutError {
            domain: "docs.example.com".to_string(),
            elapsed: Duration::from_secs(1),
            attempts: 3,
        });
        assert_eq!(FailureCause::from(timeout).label(), "validation_timeout");
        assert_eq!(
            FailureCause::from(ValidationError::Cancelled("x".to_string())),
            FailureCause::Cancelled
        );
    }

    #[test]
    fn test_delegation_credential_error_maps_to_credential() {
        let err = DelegationError::Credential(CredentialError::SamePrincipal("1".to_string()));
        assert_eq!(FailureCause::from(err).label(), "credential");
    }

    #[test]
    fn test_failure_cause_serializes_type_and_message() {
        let json = serde_json::to_value(FailureCause::Cancelled).unwrap();
        assert_eq!(json["type"], "cancelled");
        assert_eq!(json["message"], "Cancelled");
    }

    #[test]
    fn test_empty_report_is_success() {
        let mut report = RunReport::start(RunMode::Apply);
        report.finish();
        assert!(report.is_success());
        assert!(report.finished_at.is_some());
    }
}
