// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cross-Principal Zone Delegation
//!
//! The child hosted zone belongs to this deployment; the parent zone does
//! not. Delegation publishes the child's name servers as an NS record in
//! the parent zone, using a credential obtained by assuming a role that is
//! scoped to that parent zone.
//!
//! # Guarantees
//!
//! - Writes to the same parent zone never overlap (one async lock per zone)
//! - Re-running with the same name servers changes nothing
//! - A credential acting as the child zone's owner is refused

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{
    outputs, ApplyRequest, BackendError, ProvisioningBackend, RemoteStatus, ResourceAddress,
    ResourceOutputs,
};
use crate::credentials::{CredentialError, ScopedCredential};
use crate::domain::invariants::{
    validate_delegation_principals, validate_delegation_target, validate_name_servers,
};
use crate::domain::{DomainName, InvariantViolation, ResourceKind};
use crate::graph::ResourceAttributes;
use crate::wait::{wait_for, WaitConfig, WaitError};

/// Result of submitting a delegation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationOutcome {
    Created,
    Unchanged,
    Updated,
}

/// Delegation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelegationError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Node {0} does not carry delegation attributes")]
    NotADelegation(String),

    #[error("Delegated zone {0} has not published name servers")]
    MissingNameServers(String),

    #[error(transparent)]
    Propagation(#[from] WaitError<BackendError>),
}

/// Submitted delegation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationResult {
    pub outcome: DelegationOutcome,
    pub outputs: ResourceOutputs,
}

/// Submits NS records into parent zones, one writer per zone at a time
pub struct DelegationHandshake {
    backend: Arc<dyn ProvisioningBackend>,
    zone_locks: DashMap<DomainName, Arc<Mutex<()>>>,
}

impl DelegationHandshake {
    pub fn new(backend: Arc<dyn ProvisioningBackend>) -> Self {
        Self {
            backend,
            zone_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, zone: &DomainName) -> Arc<Mutex<()>> {
        self.zone_locks.entry(zone.clone()).or_default().clone()
    }

    /// Publish the child zone's name servers in its parent zone
    ///
    /// `request` is the DelegationRecord apply request: its hosted-zone
    /// input carries the name servers and its credential must be scoped to
    /// the parent zone. `child_owner` is the principal owning the child zone.
    pub async fn begin_delegation(
        &self,
        request: &ApplyRequest,
        child_owner: &str,
    ) -> Result<DelegationResult, DelegationError> {
        let ResourceAttributes::DelegationRecord(attrs) = &request.attributes else {
            return Err(DelegationError::NotADelegation(request.address.name.clone()));
        };

        validate_delegation_target(&attrs.delegated_zone, &attrs.parent_zone)?;

        let credential = request.credential.as_ref().ok_or_else(|| {
            CredentialError::Unavailable(format!("no credential for {}", attrs.parent_zone))
        })?;
        credential.authorize(&attrs.parent_zone, Utc::now())?;
        validate_delegation_principals(credential.principal(), child_owner)
            .map_err(|_| CredentialError::SamePrincipal(child_owner.to_string()))?;

        let name_servers = request
            .input(ResourceKind::HostedZone)
            .and_then(|zone| zone.outputs.list(outputs::NAME_SERVERS))
            .map(|ns| ns.to_vec())
            .ok_or_else(|| DelegationError::MissingNameServers(attrs.delegated_zone.to_string()))?;
        validate_name_servers(&name_servers)?;

        let lock = self.lock_for(&attrs.parent_zone);
        let _guard = lock.lock().await;
        debug!(parent_zone = %attrs.parent_zone, child_zone = %attrs.delegated_zone, "Holding parent zone lock");

        let outcome = match self.backend.read_status(&request.address).await? {
            RemoteStatus::Present(existing) if same_servers(&existing, &name_servers) => {
                info!(child_zone = %attrs.delegated_zone, "Delegation already in place");
                return Ok(DelegationResult {
                    outcome: DelegationOutcome::Unchanged,
                    outputs: existing,
                });
            }
            RemoteStatus::Present(_) | RemoteStatus::InProgress => DelegationOutcome::Updated,
            RemoteStatus::Absent => DelegationOutcome::Created,
        };

        let outputs = match outcome {
            DelegationOutcome::Created => match self.backend.create(request).await {
                Err(BackendError::AlreadyExists(_)) => {
                    return self.update(request, attrs.delegated_zone.as_str()).await
                }
                other => other?,
            },
            _ => return self.update(request, attrs.delegated_zone.as_str()).await,
        };

        info!(
            child_zone = %attrs.delegated_zone,
            parent_zone = %attrs.parent_zone,
            name_servers = name_servers.len(),
            "Delegation created"
        );
        Ok(DelegationResult { outcome, outputs })
    }

    async fn update(
        &self,
        request: &ApplyRequest,
        child_zone: &str,
    ) -> Result<DelegationResult, DelegationError> {
        let outputs = self.backend.update(request).await?;
        info!(child_zone, "Delegation name servers replaced");
        Ok(DelegationResult {
            outcome: DelegationOutcome::Updated,
            outputs,
        })
    }

    /// Wait until the parent zone reports the record as present
    pub async fn await_propagation(
        &self,
        address: &ResourceAddress,
        config: &WaitConfig,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResourceOutputs, DelegationError> {
        wait_for(
            config,
            cancel,
            || async {
                Ok::<_, BackendError>(matches!(
                    self.backend.read_status(address).await?,
                    RemoteStatus::Present(_)
                ))
            },
            &address.name,
        )
        .await?;

        match self.backend.read_status(address).await? {
            RemoteStatus::Present(outputs) => Ok(outputs),
            _ => Err(BackendError::NotFound(address.clone()).into()),
        }
    }

    /// Remove a delegation record from its parent zone
    ///
    /// Returns `false` when the record was already gone.
    pub async fn withdraw(
        &self,
        address: &ResourceAddress,
        parent_zone: &DomainName,
        credential: &ScopedCredential,
    ) -> Result<bool, DelegationError> {
        credential.authorize(parent_zone, Utc::now())?;

        let lock = self.lock_for(parent_zone);
        let _guard = lock.lock().await;
        match self.backend.delete(address).await {
            Ok(()) => {
                info!(%parent_zone, record = %address.name, "Delegation withdrawn");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn same_servers(existing: &ResourceOutputs, wanted: &[String]) -> bool {
    let Some(current) = existing.list(outputs::NAME_SERVERS) else {
        return false;
    };
    let mut current = current.to_vec();
    let mut wanted = wanted.to_vec();
    current.sort();
    wanted.sort();
    current == wanted
}
