// Copyright (c) 2025 - Cowboy AI, Inc.
//! DNS-Validated Certificate Issuance
//!
//! The certificate authority proves domain ownership by looking for a
//! record it dictates. [`ValidationWaiter`] requests the certificate,
//! publishes that record in the validation zone, and then polls with
//! bounded exponential backoff until the authority issues the certificate.
//!
//! A handle is never reported Ready unless the validation record has been
//! observed in the zone. Requests for one domain are serialized: while a
//! validation is pending, or the authority already holds a usable
//! certificate for the domain, no new certificate is requested.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{
    outputs, ApplyRequest, BackendError, InputBinding, ProvisioningBackend, RemoteStatus,
    ResourceAddress, ResourceOutputs,
};
use crate::domain::invariants::validate_certificate_domain;
use crate::domain::{DomainName, InvariantViolation, Region, ResourceKind};
use crate::graph::{DnsRecordAttributes, NodeId, RecordTarget, RecordType, ResourceAttributes};
use crate::wait::{wait_for, WaitConfig, WaitError};

/// Record the authority wants to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Fully-qualified record name
    pub name: String,
    pub value: String,
}

/// Accepted certificate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_id: String,
    pub validation_record: ValidationRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Certificate request rejected: {0}")]
    Rejected(String),

    #[error("Certificate authority unavailable: {0}")]
    Unavailable(String),
}

/// Certificate authority port
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Most recent certificate for `domain` in `region`, with the record
    /// that validates it
    async fn find_certificate(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<Option<CertificateRequest>, AuthorityError>;

    async fn request_certificate(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<CertificateRequest, AuthorityError>;

    async fn certificate_status(&self, certificate_id: &str)
        -> Result<CertificateStatus, AuthorityError>;

    async fn delete_certificate(&self, certificate_id: &str) -> Result<(), AuthorityError>;
}

/// Validation did not finish within the allowed time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation of {domain} timed out after {elapsed:?} ({attempts} polls)")]
pub struct ValidationTimeoutError {
    pub domain: String,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Timeout(#[from] ValidationTimeoutError),

    #[error("Validation of {0} cancelled")]
    Cancelled(String),

    #[error("Certificate for {domain} failed validation: {reason}")]
    Failed { domain: String, reason: String },

    #[error(transparent)]
    Authority(#[from] AuthorityError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Certificate to request for one graph node
#[derive(Debug, Clone)]
pub struct CertificateOrder {
    pub node: NodeId,
    /// Logical name of the certificate node
    pub name: String,
    pub domain: DomainName,
    /// Zone the validation record is written to
    pub validation_zone: DomainName,
    pub region: Region,
    /// Outputs of the certificate's dependencies (the validation zone)
    pub inputs: Vec<InputBinding>,
}

/// In-flight validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingValidation {
    pub domain: DomainName,
    pub certificate_id: String,
    pub validation_record: ValidationRecord,
    pub record_address: ResourceAddress,
    pub requested_at: DateTime<Utc>,
}

impl PendingValidation {
    pub fn outputs(&self) -> ResourceOutputs {
        ResourceOutputs::new()
            .with_scalar(outputs::CERTIFICATE_ID, &self.certificate_id)
            .with_scalar(outputs::VALIDATION_RECORD, &self.validation_record.name)
            .with_scalar(outputs::RESOURCE_ID, &self.certificate_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pending,
    Ready,
}

/// Requests certificates and waits for their DNS validation
pub struct ValidationWaiter {
    backend: Arc<dyn ProvisioningBackend>,
    authority: Arc<dyn CertificateAuthority>,
    config: WaitConfig,
    pending: DashMap<DomainName, PendingValidation>,
    domain_locks: DashMap<DomainName, Arc<Mutex<()>>>,
}

impl ValidationWaiter {
    pub fn new(
        backend: Arc<dyn ProvisioningBackend>,
        authority: Arc<dyn CertificateAuthority>,
        config: WaitConfig,
    ) -> Self {
        Self {
            backend,
            authority,
            config,
            pending: DashMap::new(),
            domain_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, domain: &DomainName) -> Arc<Mutex<()>> {
        self.domain_locks.entry(domain.clone()).or_default().clone()
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Request a certificate and publish its validation record
    ///
    /// A domain with a validation already in flight gets the same handle
    /// back. A certificate the authority already holds for the domain is
    /// adopted unless it failed validation. Only otherwise is the
    /// authority asked for a new one.
    pub async fn request_certificate(
        &self,
        order: &CertificateOrder,
    ) -> Result<PendingValidation, ValidationError> {
        let lock = self.lock_for(&order.domain);
        let _guard = lock.lock().await;

        if let Some(existing) = self.pending.get(&order.domain) {
            debug!(domain = %order.domain, "Reusing pending validation");
            return Ok(existing.clone());
        }

        validate_certificate_domain(&order.domain, &order.validation_zone)?;

        let request = match self.adoptable(&order.domain, &order.region).await? {
            Some(existing) => {
                info!(
                    domain = %order.domain,
                    certificate_id = %existing.certificate_id,
                    "Adopting existing certificate"
                );
                existing
            }
            None => {
                self.authority
                    .request_certificate(&order.domain, &order.region)
                    .await?
            }
        };

        let relative = request
            .validation_record
            .name
            .strip_suffix(&format!(".{}", order.validation_zone))
            .ok_or_else(|| {
                InvariantViolation::InvalidRecordName(request.validation_record.name.clone())
            })?
            .to_string();

        let record_address = Self::record_address(&order.name, &order.region);
        let publish = ApplyRequest {
            node: order.node,
            address: record_address.clone(),
            attributes: ResourceAttributes::DnsRecord(DnsRecordAttributes {
                record_name: Some(relative),
                record_type: RecordType::Cname,
                target: RecordTarget::Literal(request.validation_record.value.clone()),
            }),
            inputs: order.inputs.clone(),
            credential: None,
        };

        match self.backend.create(&publish).await {
            Ok(_) => {}
            Err(BackendError::AlreadyExists(_)) => {
                debug!(record = %request.validation_record.name, "Validation record already present");
            }
            Err(e) => return Err(e.into()),
        }

        let handle = PendingValidation {
            domain: order.domain.clone(),
            certificate_id: request.certificate_id,
            validation_record: request.validation_record,
            record_address,
            requested_at: Utc::now(),
        };
        info!(
            domain = %handle.domain,
            certificate_id = %handle.certificate_id,
            "Validation record published"
        );

        self.pending.insert(order.domain.clone(), handle.clone());
        Ok(handle)
    }

    /// Certificate the authority holds for the domain, unless it failed
    async fn adoptable(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<Option<CertificateRequest>, ValidationError> {
        let Some(existing) = self.authority.find_certificate(domain, region).await? else {
            return Ok(None);
        };
        match self
            .authority
            .certificate_status(&existing.certificate_id)
            .await
        {
            Ok(CertificateStatus::Failed(reason)) => {
                debug!(%domain, certificate_id = %existing.certificate_id, %reason, "Existing certificate failed, requesting anew");
                Ok(None)
            }
            Ok(_) => Ok(Some(existing)),
            Err(AuthorityError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Identifier of the certificate the authority holds for the domain
    pub async fn find_existing(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<Option<String>, ValidationError> {
        Ok(self
            .authority
            .find_certificate(domain, region)
            .await?
            .map(|found| found.certificate_id))
    }

    /// One validation check
    pub async fn poll_validation(
        &self,
        handle: &PendingValidation,
    ) -> Result<ValidationState, ValidationError> {
        let observed = matches!(
            self.backend.read_status(&handle.record_address).await?,
            RemoteStatus::Present(_)
        );
        if !observed {
            debug!(record = %handle.validation_record.name, "Validation record not yet visible");
            return Ok(ValidationState::Pending);
        }

        match self
            .authority
            .certificate_status(&handle.certificate_id)
            .await?
        {
            CertificateStatus::Issued => Ok(ValidationState::Ready),
            CertificateStatus::PendingValidation => Ok(ValidationState::Pending),
            CertificateStatus::Failed(reason) => Err(ValidationError::Failed {
                domain: handle.domain.to_string(),
                reason,
            }),
        }
    }

    /// Poll until issued, timed out, or cancelled
    pub async fn wait_for_validation(
        &self,
        handle: &PendingValidation,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResourceOutputs, ValidationError> {
        let result = wait_for(
            &self.config,
            cancel,
            || async {
                Ok::<_, ValidationError>(
                    self.poll_validation(handle).await? == ValidationState::Ready,
                )
            },
            handle.domain.as_str(),
        )
        .await;

        match result {
            Ok(attempts) => {
                self.pending.remove(&handle.domain);
                info!(domain = %handle.domain, attempts, "Certificate issued");
                Ok(handle.outputs())
            }
            Err(WaitError::Timeout {
                elapsed, attempts, ..
            }) => {
                warn!(domain = %handle.domain, ?elapsed, "Certificate validation timed out");
                Err(ValidationTimeoutError {
                    domain: handle.domain.to_string(),
                    elapsed,
                    attempts,
                }
                .into())
            }
            Err(WaitError::Cancelled(_)) => {
                Err(ValidationError::Cancelled(handle.domain.to_string()))
            }
            Err(WaitError::Check { cause, .. }) => {
                if matches!(cause, ValidationError::Failed { .. }) {
                    self.pending.remove(&handle.domain);
                }
                Err(cause)
            }
        }
    }

    /// Delete a certificate and its validation record; absent is fine
    pub async fn release(
        &self,
        certificate_id: &str,
        record_address: &ResourceAddress,
    ) -> Result<(), ValidationError> {
        match self.authority.delete_certificate(certificate_id).await {
            Ok(()) | Err(AuthorityError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        match self.backend.delete(record_address).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.pending.retain(|_, p| p.certificate_id != certificate_id);
        Ok(())
    }

    /// Address of the validation record published for a certificate node
    pub fn record_address(name: &str, region: &Region) -> ResourceAddress {
        ResourceAddress::new(
            ResourceKind::DnsRecord,
            region.clone(),
            format!("{}Validation", name),
        )
    }
}
