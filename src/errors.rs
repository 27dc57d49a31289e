// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for provisioning operations

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::delegation::DelegationError;
use crate::domain::InvariantViolation;
use crate::graph::GraphError;
use crate::partition::PartitionError;
use crate::state_machine::TransitionError;
use crate::validation::ValidationError;

/// Errors that can occur while planning or provisioning a deployment
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Missing or malformed configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Graph failed construction-time checks
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// No region assignment satisfies the policy
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Configuration breaks a domain rule
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Delegation(#[from] DelegationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CycleError;

    #[test]
    fn test_graph_error_converts() {
        let err: ProvisioningError = GraphError::Cycle(CycleError {
            path: vec![],
            names: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        })
        .into();
        assert!(matches!(err, ProvisioningError::Graph(_)));
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_config_error_message_passes_through() {
        let err: ProvisioningError = ConfigError::Missing("STACK_NAME").into();
        assert_eq!(err.to_string(), ConfigError::Missing("STACK_NAME").to_string());
    }
}
