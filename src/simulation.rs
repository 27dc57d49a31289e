// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Simulation
//!
//! Deterministic stand-ins for the provisioning backend, the credential
//! provider and the certificate authority. Used by the test suite and by
//! `static-distribution --simulate`.
//!
//! State lives in [`DashMap`]s keyed by [`ResourceAddress`]. Every call is
//! recorded in an operation journal so callers can assert ordering.
//! Certificates are held by the backend too, so every simulated authority
//! attached to one backend sees the same account.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::{
    outputs, ApplyRequest, BackendError, BackendResult, OutputValue, ProvisioningBackend,
    RemoteStatus, ResourceAddress, ResourceOutputs,
};
use crate::credentials::{CredentialError, CredentialProvider, ScopedCredential};
use crate::domain::{DomainName, Region, ResourceKind, RoleArn};
use crate::graph::{RecordTarget, ResourceAttributes};
use crate::validation::{
    AuthorityError, CertificateAuthority, CertificateRequest, CertificateStatus, ValidationRecord,
};

/// Kind of backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub operation: Operation,
    pub address: ResourceAddress,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredResource {
    attributes: ResourceAttributes,
    outputs: ResourceOutputs,
}

/// Backend keeping resources in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    resources: DashMap<ResourceAddress, StoredResource>,
    hidden: DashSet<ResourceAddress>,
    failures: DashMap<String, String>,
    journal: Mutex<Vec<JournalEntry>>,
    next_id: AtomicU64,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    certificates: DashMap<String, SimulatedCertificate>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every create and delete by `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Reject creates and updates of the resource with this logical name
    pub fn fail_on(&self, name: &str, reason: &str) {
        self.failures.insert(name.to_string(), reason.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Make a resource invisible to reads (propagation lag)
    pub fn hide(&self, address: &ResourceAddress) {
        self.hidden.insert(address.clone());
    }

    pub fn reveal(&self, address: &ResourceAddress) {
        self.hidden.remove(address);
    }

    /// Pre-populate a resource as if an earlier run had created it
    pub fn seed(
        &self,
        address: ResourceAddress,
        attributes: ResourceAttributes,
        outputs: ResourceOutputs,
    ) {
        self.resources.insert(
            address,
            StoredResource {
                attributes,
                outputs,
            },
        );
    }

    /// Remove a resource behind the orchestrator's back
    pub fn forget(&self, address: &ResourceAddress) {
        self.resources.remove(address);
    }

    pub fn contains(&self, address: &ResourceAddress) -> bool {
        self.resources.contains_key(address)
    }

    pub fn record_count(&self, kind: ResourceKind) -> usize {
        self.resources
            .iter()
            .filter(|entry| entry.key().kind == kind)
            .count()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    /// Logical names in the order they were successfully created
    pub fn created(&self) -> Vec<String> {
        self.names_for(Operation::Create)
    }

    /// Logical names in the order they were successfully deleted
    pub fn deleted(&self) -> Vec<String> {
        self.names_for(Operation::Delete)
    }

    /// Certificates currently held by the simulated authority
    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    /// Highest number of concurrent create/delete calls seen
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// A visible DNS record carries this literal value
    pub fn has_visible_record_value(&self, value: &str) -> bool {
        self.resources.iter().any(|entry| {
            !self.hidden.contains(entry.key())
                && matches!(
                    &entry.value().attributes,
                    ResourceAttributes::DnsRecord(attrs)
                        if attrs.target == RecordTarget::Literal(value.to_string())
                )
        })
    }

    fn names_for(&self, operation: Operation) -> Vec<String> {
        self.journal
            .lock()
            .iter()
            .filter(|e| e.operation == operation)
            .map(|e| e.address.name.clone())
            .collect()
    }

    fn record(&self, operation: Operation, address: &ResourceAddress) {
        self.journal.lock().push(JournalEntry {
            operation,
            address: address.clone(),
            at: Utc::now(),
        });
    }

    async fn simulate_latency(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check_failure(&self, address: &ResourceAddress) -> BackendResult<()> {
        match self.failures.get(&address.name) {
            Some(reason) => Err(BackendError::Rejected {
                address: address.clone(),
                reason: reason.value().clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn build_outputs(&self, request: &ApplyRequest, id: u64) -> BackendResult<ResourceOutputs> {
        let address = &request.address;
        let rejected = |reason: &str| BackendError::Rejected {
            address: address.clone(),
            reason: reason.to_string(),
        };

        let outputs = match &request.attributes {
            ResourceAttributes::Bucket(attrs) => {
                let bucket = format!("{}-{:08x}", attrs.name_prefix, id);
                ResourceOutputs::new()
                    .with_scalar(outputs::BUCKET_NAME, &bucket)
                    .with_scalar(outputs::RESOURCE_ID, bucket)
            }
            ResourceAttributes::HostedZone(attrs) => {
                let zone_id = format!("Z{:012}", id);
                let name_servers = ["com", "net", "org", "co.uk"]
                    .iter()
                    .enumerate()
                    .map(|(i, tld)| format!("ns-{}.sim-dns-{:02}.{}", id * 4 + i as u64, i, tld))
                    .collect();
                ResourceOutputs::new()
                    .with_scalar(outputs::HOSTED_ZONE_ID, &zone_id)
                    .with_scalar(outputs::ZONE_NAME, attrs.zone_name.as_str())
                    .with_list(outputs::NAME_SERVERS, name_servers)
                    .with_scalar(outputs::RESOURCE_ID, zone_id)
            }
            ResourceAttributes::DelegationRecord(attrs) => {
                let name_servers = request
                    .input(ResourceKind::HostedZone)
                    .and_then(|zone| zone.outputs.list(outputs::NAME_SERVERS))
                    .ok_or_else(|| rejected("delegation without name servers"))?;
                ResourceOutputs::new()
                    .with_list(outputs::NAME_SERVERS, name_servers.to_vec())
                    .with_scalar(
                        outputs::RESOURCE_ID,
                        format!("{}/{}/NS", attrs.parent_zone, attrs.delegated_zone),
                    )
            }
            ResourceAttributes::Certificate(attrs) => {
                let certificate_id = format!("cert-{:08x}", id);
                ResourceOutputs::new()
                    .with_scalar(outputs::CERTIFICATE_ID, &certificate_id)
                    .with_scalar(outputs::RESOURCE_ID, certificate_id)
                    .with_scalar(outputs::RECORD_FQDN, attrs.domain_name.as_str())
            }
            ResourceAttributes::Distribution(_) => {
                let bucket = request
                    .input(ResourceKind::Bucket)
                    .and_then(|b| b.outputs.scalar(outputs::BUCKET_NAME))
                    .ok_or_else(|| rejected("distribution without origin bucket"))?;
                request
                    .input(ResourceKind::Certificate)
                    .and_then(|c| c.outputs.scalar(outputs::CERTIFICATE_ID))
                    .ok_or_else(|| rejected("distribution without certificate"))?;
                let distribution_id = format!("E{:012X}", id);
                debug!(%distribution_id, origin = bucket, "Simulated distribution");
                ResourceOutputs::new()
                    .with_scalar(outputs::DISTRIBUTION_ID, &distribution_id)
                    .with_scalar(
                        outputs::DISTRIBUTION_DOMAIN,
                        format!("d{:012x}.cdn.example.net", id),
                    )
                    .with_scalar(outputs::RESOURCE_ID, distribution_id)
            }
            ResourceAttributes::DnsRecord(attrs) => {
                if attrs.target == RecordTarget::Distribution {
                    request
                        .input(ResourceKind::Distribution)
                        .and_then(|d| d.outputs.scalar(outputs::DISTRIBUTION_DOMAIN))
                        .ok_or_else(|| rejected("alias record without distribution"))?;
                }
                let zone = request
                    .input(ResourceKind::HostedZone)
                    .and_then(|z| z.outputs.scalar(outputs::ZONE_NAME));
                let fqdn = match (&attrs.record_name, zone) {
                    (Some(name), Some(zone)) => format!("{}.{}", name, zone),
                    (Some(name), None) => name.clone(),
                    (None, Some(zone)) => zone.to_string(),
                    (None, None) => address.name.clone(),
                };
                ResourceOutputs::new()
                    .with_scalar(outputs::RECORD_FQDN, &fqdn)
                    .with_scalar(outputs::RESOURCE_ID, fqdn)
            }
        };
        Ok(outputs)
    }
}

#[async_trait]
impl ProvisioningBackend for InMemoryBackend {
    async fn create(&self, request: &ApplyRequest) -> BackendResult<ResourceOutputs> {
        self.simulate_latency().await;
        self.check_failure(&request.address)?;

        if self.resources.contains_key(&request.address) {
            return Err(BackendError::AlreadyExists(request.address.clone()));
        }

        let outputs = self.build_outputs(request, self.next_id())?;
        self.resources.insert(
            request.address.clone(),
            StoredResource {
                attributes: request.attributes.clone(),
                outputs: outputs.clone(),
            },
        );
        self.record(Operation::Create, &request.address);
        debug!(address = %request.address, "Simulated create");
        Ok(outputs)
    }

    async fn read_status(&self, address: &ResourceAddress) -> BackendResult<RemoteStatus> {
        self.record(Operation::Read, address);
        if self.hidden.contains(address) {
            return Ok(RemoteStatus::Absent);
        }
        Ok(match self.resources.get(address) {
            Some(stored) => RemoteStatus::Present(stored.outputs.clone()),
            None => RemoteStatus::Absent,
        })
    }

    async fn update(&self, request: &ApplyRequest) -> BackendResult<ResourceOutputs> {
        self.check_failure(&request.address)?;

        let mut stored = self
            .resources
            .get_mut(&request.address)
            .ok_or_else(|| BackendError::NotFound(request.address.clone()))?;

        // Identifiers survive an update; settings-derived values are replaced.
        // A zone keeps the name servers it was given at creation.
        let mut outputs = stored.outputs.clone();
        if request.address.kind != ResourceKind::HostedZone {
            outputs.extend(settings_only(self.build_outputs(request, 0)?));
        }
        stored.attributes = request.attributes.clone();
        stored.outputs = outputs.clone();
        drop(stored);

        self.record(Operation::Update, &request.address);
        Ok(outputs)
    }

    async fn delete(&self, address: &ResourceAddress) -> BackendResult<()> {
        self.simulate_latency().await;
        self.hidden.remove(address);
        match self.resources.remove(address) {
            Some(_) => {
                self.record(Operation::Delete, address);
                Ok(())
            }
            None => Err(BackendError::NotFound(address.clone())),
        }
    }
}

/// Values derived from settings, without anything identifying the resource
fn settings_only(outputs: ResourceOutputs) -> ResourceOutputs {
    const IDENTIFIERS: [&str; 6] = [
        outputs::RESOURCE_ID,
        outputs::BUCKET_NAME,
        outputs::HOSTED_ZONE_ID,
        outputs::CERTIFICATE_ID,
        outputs::DISTRIBUTION_ID,
        outputs::DISTRIBUTION_DOMAIN,
    ];
    outputs
        .iter()
        .filter(|(name, _)| !IDENTIFIERS.contains(&name.as_str()))
        .fold(ResourceOutputs::new(), |kept, (name, value)| match value {
            OutputValue::Scalar(s) => kept.with_scalar(name, s),
            OutputValue::List(l) => kept.with_list(name, l.clone()),
        })
}

/// Credential provider with a fixed identity
#[derive(Debug)]
pub struct StaticCredentialProvider {
    caller: String,
    denied: Option<String>,
    validity: ChronoDuration,
    assumed: AtomicU32,
}

impl StaticCredentialProvider {
    /// Deployment runs as `caller`; assumed roles act as the role's account
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            denied: None,
            validity: ChronoDuration::hours(1),
            assumed: AtomicU32::new(0),
        }
    }

    /// Every role assumption fails with `reason`
    pub fn denying(caller: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            denied: Some(reason.into()),
            ..Self::new(caller)
        }
    }

    pub fn assumed_roles(&self) -> u32 {
        self.assumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn caller_principal(&self) -> Result<String, CredentialError> {
        Ok(self.caller.clone())
    }

    async fn assume_role(
        &self,
        role: &RoleArn,
        scope: &DomainName,
    ) -> Result<ScopedCredential, CredentialError> {
        if let Some(reason) = &self.denied {
            return Err(CredentialError::AssumeRoleDenied {
                role: role.to_string(),
                reason: reason.clone(),
            });
        }
        self.assumed.fetch_add(1, Ordering::SeqCst);
        Ok(ScopedCredential::new(
            role.clone(),
            role.account_id(),
            scope.clone(),
            Utc::now() + self.validity,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthorityMode {
    /// Issue once the validation record is visible
    Validates,
    /// Stay pending forever
    NeverValidates,
}

#[derive(Debug, Clone)]
struct SimulatedCertificate {
    serial: u64,
    domain: DomainName,
    region: Region,
    validation_record: ValidationRecord,
}

/// Certificate authority that checks the simulated zone for its record
#[derive(Debug)]
pub struct SimulatedCertificateAuthority {
    backend: Arc<InMemoryBackend>,
    mode: AuthorityMode,
    requests: AtomicU32,
}

impl SimulatedCertificateAuthority {
    pub fn new(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            backend,
            mode: AuthorityMode::Validates,
            requests: AtomicU32::new(0),
        }
    }

    pub fn never_validates(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            mode: AuthorityMode::NeverValidates,
            ..Self::new(backend)
        }
    }

    /// Number of certificate requests accepted by this authority
    pub fn issued_requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// FNV-1a, stable across runs
fn token_for(domain: &str) -> String {
    let hash = domain.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    });
    format!("{:016x}", hash)
}

#[async_trait]
impl CertificateAuthority for SimulatedCertificateAuthority {
    async fn find_certificate(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<Option<CertificateRequest>, AuthorityError> {
        Ok(self
            .backend
            .certificates
            .iter()
            .filter(|entry| entry.value().domain == *domain && entry.value().region == *region)
            .max_by_key(|entry| entry.value().serial)
            .map(|entry| CertificateRequest {
                certificate_id: entry.key().clone(),
                validation_record: entry.value().validation_record.clone(),
            }))
    }

    async fn request_certificate(
        &self,
        domain: &DomainName,
        region: &Region,
    ) -> Result<CertificateRequest, AuthorityError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let serial = self.backend.next_id();
        let certificate_id = format!("{}:certificate/{:08x}", region, serial);

        let base = if domain.is_wildcard() {
            domain.parent().unwrap_or_else(|| domain.clone())
        } else {
            domain.clone()
        };
        let token = token_for(base.as_str());
        let validation_record = ValidationRecord {
            name: format!("_{}.{}", &token[..12], base),
            value: format!("_{}.validations.sim-ca.example", token),
        };

        self.backend.certificates.insert(
            certificate_id.clone(),
            SimulatedCertificate {
                serial,
                domain: domain.clone(),
                region: region.clone(),
                validation_record: validation_record.clone(),
            },
        );

        Ok(CertificateRequest {
            certificate_id,
            validation_record,
        })
    }

    async fn certificate_status(
        &self,
        certificate_id: &str,
    ) -> Result<CertificateStatus, AuthorityError> {
        let record_value = self
            .backend
            .certificates
            .get(certificate_id)
            .map(|c| c.value().validation_record.value.clone())
            .ok_or_else(|| AuthorityError::NotFound(certificate_id.to_string()))?;

        if self.mode == AuthorityMode::NeverValidates {
            return Ok(CertificateStatus::PendingValidation);
        }

        if self.backend.has_visible_record_value(&record_value) {
            Ok(CertificateStatus::Issued)
        } else {
            Ok(CertificateStatus::PendingValidation)
        }
    }

    async fn delete_certificate(&self, certificate_id: &str) -> Result<(), AuthorityError> {
        self.backend
            .certificates
            .remove(certificate_id)
            .map(|_| ())
            .ok_or_else(|| AuthorityError::NotFound(certificate_id.to_string()))
    }
}
