// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Backend Port
//!
//! The orchestrator never talks to a cloud API directly; it goes through
//! [`ProvisioningBackend`]. Implementations must treat every call as
//! idempotent with respect to `(kind, region, name)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::credentials::ScopedCredential;
use crate::domain::{Region, ResourceKind};
use crate::graph::{EdgeKind, NodeId, ResourceAttributes};

/// Well-known output names
pub mod outputs {
    pub const RESOURCE_ID: &str = "resource_id";
    pub const BUCKET_NAME: &str = "bucket_name";
    pub const HOSTED_ZONE_ID: &str = "hosted_zone_id";
    pub const ZONE_NAME: &str = "zone_name";
    pub const NAME_SERVERS: &str = "name_servers";
    pub const CERTIFICATE_ID: &str = "certificate_id";
    pub const VALIDATION_RECORD: &str = "validation_record";
    pub const DISTRIBUTION_ID: &str = "distribution_id";
    pub const DISTRIBUTION_DOMAIN: &str = "distribution_domain_name";
    pub const RECORD_FQDN: &str = "record_fqdn";
}

/// Value published by a Ready node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Scalar(String),
    List(Vec<String>),
}

impl OutputValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            Self::Scalar(_) => None,
        }
    }
}

/// Named outputs of one resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceOutputs(BTreeMap<String, OutputValue>);

impl ResourceOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalar(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0
            .insert(name.to_string(), OutputValue::Scalar(value.into()));
        self
    }

    pub fn with_list(mut self, name: &str, values: Vec<String>) -> Self {
        self.0.insert(name.to_string(), OutputValue::List(values));
        self
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.0.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(OutputValue::as_scalar)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).and_then(OutputValue::as_list)
    }

    /// Merge `other` into `self`, `other` winning on conflicts
    pub fn extend(&mut self, other: ResourceOutputs) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity of a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceAddress {
    pub kind: ResourceKind,
    pub region: Region,
    pub name: String,
}

impl ResourceAddress {
    pub fn new(kind: ResourceKind, region: Region, name: impl Into<String>) -> Self {
        Self {
            kind,
            region,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.kind.as_str(), self.name)
    }
}

/// Outputs of a Ready dependency, as seen by its consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputBinding {
    pub from: NodeId,
    pub name: String,
    pub kind: ResourceKind,
    pub edge_kind: EdgeKind,
    /// Producer lives in another region than the consumer
    pub cross_region: bool,
    pub outputs: ResourceOutputs,
}

/// Create or update request for one node
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub node: NodeId,
    pub address: ResourceAddress,
    pub attributes: ResourceAttributes,
    pub inputs: Vec<InputBinding>,
    /// Present only for writes into a zone owned by another principal
    pub credential: Option<ScopedCredential>,
}

impl ApplyRequest {
    /// First bound input of a kind
    pub fn input(&self, kind: ResourceKind) -> Option<&InputBinding> {
        self.inputs.iter().find(|i| i.kind == kind)
    }
}

/// Remote state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Absent,
    InProgress,
    Present(ResourceOutputs),
}

/// Backend failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Resource not found: {0}")]
    NotFound(ResourceAddress),

    #[error("Resource already exists: {0}")]
    AlreadyExists(ResourceAddress),

    #[error("Request for {address} rejected: {reason}")]
    Rejected {
        address: ResourceAddress,
        reason: String,
    },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// "Already deleted" counts as success during teardown
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Remote resource operations
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Create the resource and return its outputs
    async fn create(&self, request: &ApplyRequest) -> BackendResult<ResourceOutputs>;

    /// Current remote state
    async fn read_status(&self, address: &ResourceAddress) -> BackendResult<RemoteStatus>;

    /// Replace the resource's settings in place
    async fn update(&self, request: &ApplyRequest) -> BackendResult<ResourceOutputs>;

    /// Delete the resource
    async fn delete(&self, address: &ResourceAddress) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_accessors() {
        let outputs = ResourceOutputs::new()
            .with_scalar(outputs::HOSTED_ZONE_ID, "Z123")
            .with_list(outputs::NAME_SERVERS, vec!["ns-1.example.net".to_string()]);

        assert_eq!(outputs.scalar(outputs::HOSTED_ZONE_ID), Some("Z123"));
        assert_eq!(outputs.list(outputs::NAME_SERVERS).map(|l| l.len()), Some(1));
        assert_eq!(outputs.scalar(outputs::NAME_SERVERS), None);
    }

    #[test]
    fn test_outputs_serialize_flat() {
        let outputs = ResourceOutputs::new()
            .with_scalar("a", "1")
            .with_list("b", vec!["x".to_string()]);
        let json = serde_json::to_value(&outputs).unwrap();
        assert_eq!(json, serde_json::json!({"a": "1", "b": ["x"]}));
    }

    #[test]
    fn test_address_display() {
        let address = ResourceAddress::new(
            ResourceKind::Bucket,
            Region::new("eu-west-1").unwrap(),
            "wwwBucket",
        );
        assert_eq!(address.to_string(), "eu-west-1/bucket/wwwBucket");
        assert!(BackendError::NotFound(address).is_not_found());
    }
}
