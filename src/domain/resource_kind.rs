// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Resource Kind Taxonomy
//!
//! The closed set of resource kinds a static distribution is built from.
//! Every node in the resource graph carries exactly one of these.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Object storage bucket holding the static content
    Bucket,
    /// Delegated DNS zone owned by this deployment
    HostedZone,
    /// NS record in the parent zone pointing at the delegated zone
    DelegationRecord,
    /// DNS-validated TLS certificate
    Certificate,
    /// Content-delivery distribution in front of the bucket
    Distribution,
    /// Alias record pointing the public name at the distribution
    DnsRecord,
}

impl ResourceKind {
    /// Every kind, in leaf-first declaration order
    pub const ALL: [ResourceKind; 6] = [
        Self::Bucket,
        Self::HostedZone,
        Self::DelegationRecord,
        Self::Certificate,
        Self::Distribution,
        Self::DnsRecord,
    ];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::HostedZone => "hosted_zone",
            Self::DelegationRecord => "delegation_record",
            Self::Certificate => "certificate",
            Self::Distribution => "distribution",
            Self::DnsRecord => "dns_record",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bucket => "Bucket",
            Self::HostedZone => "Hosted Zone",
            Self::DelegationRecord => "Delegation Record",
            Self::Certificate => "Certificate",
            Self::Distribution => "Distribution",
            Self::DnsRecord => "DNS Record",
        }
    }

    /// Get the primary category for this kind
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Bucket => ResourceCategory::Storage,
            Self::HostedZone | Self::DelegationRecord | Self::DnsRecord => ResourceCategory::Dns,
            Self::Certificate => ResourceCategory::Security,
            Self::Distribution => ResourceCategory::Delivery,
        }
    }

    /// Kinds whose readiness depends on a party outside the deployment
    pub fn requires_external_confirmation(&self) -> bool {
        matches!(self, Self::Certificate | Self::DelegationRecord)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Unrecognised resource kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bucket" | "s3" | "storage" => Ok(Self::Bucket),
            "hosted_zone" | "zone" => Ok(Self::HostedZone),
            "delegation_record" | "delegation" | "ns" => Ok(Self::DelegationRecord),
            "certificate" | "cert" | "acm" => Ok(Self::Certificate),
            "distribution" | "cdn" | "cloudfront" => Ok(Self::Distribution),
            "dns_record" | "record" | "alias" => Ok(Self::DnsRecord),
            other => Err(UnknownResourceKind(other.to_string())),
        }
    }
}

/// Resource category (high-level grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    Storage,
    Dns,
    Security,
    Delivery,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "Storage"),
            Self::Dns => write!(f, "DNS"),
            Self::Security => write!(f, "Security"),
            Self::Delivery => write!(f, "Content Delivery"),
        }
    }
}
