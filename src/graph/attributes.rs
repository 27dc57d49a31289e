// Copyright (c) 2025 - Cowboy AI, Inc.
//! Kind-Specific Resource Attributes
//!
//! Declarative settings for each node. Attributes never contain values that
//! are only known after creation (identifiers, name servers); those travel
//! as output values from dependencies.

use serde::{Deserialize, Serialize};

use crate::domain::{DomainName, ResourceKind, RoleArn};

/// What happens to a resource when the deployment is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource
    #[default]
    Destroy,
    /// Leave the resource in place and forget about it
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAttributes {
    /// Prefix for the generated bucket name
    pub name_prefix: String,
    /// Block every form of public access (content is served through the CDN)
    pub block_public_access: bool,
    pub removal_policy: RemovalPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneAttributes {
    pub zone_name: DomainName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationAttributes {
    /// Zone that receives the NS record (owned by another principal)
    pub parent_zone: DomainName,
    /// Zone being delegated
    pub delegated_zone: DomainName,
    /// Role assumed to write into the parent zone
    pub delegation_role: RoleArn,
    pub ttl_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateAttributes {
    pub domain_name: DomainName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<DomainName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerProtocolPolicy {
    #[default]
    RedirectToHttps,
    HttpsOnly,
    AllowAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedMethods {
    GetHead,
    #[default]
    GetHeadOptions,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceClass {
    /// North America and Europe edge locations only
    #[default]
    #[serde(rename = "PriceClass_100")]
    PriceClass100,
    #[serde(rename = "PriceClass_200")]
    PriceClass200,
    #[serde(rename = "PriceClass_All")]
    PriceClassAll,
}

/// Cache TTL bounds, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub min_ttl_seconds: u64,
    pub default_ttl_seconds: u64,
    pub max_ttl_seconds: u64,
}

impl CachePolicy {
    const DAY: u64 = 24 * 60 * 60;

    /// Long-lived static content: at least 90 days in edge caches
    pub fn static_content() -> Self {
        Self {
            min_ttl_seconds: 90 * Self::DAY,
            default_ttl_seconds: 90 * Self::DAY,
            max_ttl_seconds: 365 * Self::DAY,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::static_content()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionAttributes {
    /// Public names served by the distribution
    pub aliases: Vec<DomainName>,
    pub default_root_object: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: AllowedMethods,
    pub price_class: PriceClass,
    pub cache_policy: CachePolicy,
}

impl DistributionAttributes {
    pub fn for_aliases(aliases: Vec<DomainName>) -> Self {
        Self {
            aliases,
            default_root_object: "index.html".to_string(),
            viewer_protocol_policy: ViewerProtocolPolicy::default(),
            allowed_methods: AllowedMethods::default(),
            price_class: PriceClass::default(),
            cache_policy: CachePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordType {
    #[default]
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "CNAME")]
    Cname,
}

/// What a DNS record points at
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTarget {
    /// Alias to the distribution this record depends on
    #[default]
    Distribution,
    /// Fixed value (validation records)
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordAttributes {
    /// Name relative to the zone; `None` targets the zone apex
    pub record_name: Option<String>,
    pub record_type: RecordType,
    #[serde(default)]
    pub target: RecordTarget,
}

/// Attributes of a resource node, one variant per [`ResourceKind`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceAttributes {
    Bucket(BucketAttributes),
    HostedZone(HostedZoneAttributes),
    DelegationRecord(DelegationAttributes),
    Certificate(CertificateAttributes),
    Distribution(DistributionAttributes),
    DnsRecord(DnsRecordAttributes),
}

impl ResourceAttributes {
    /// The kind these attributes describe
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Bucket(_) => ResourceKind::Bucket,
            Self::HostedZone(_) => ResourceKind::HostedZone,
            Self::DelegationRecord(_) => ResourceKind::DelegationRecord,
            Self::Certificate(_) => ResourceKind::Certificate,
            Self::Distribution(_) => ResourceKind::Distribution,
            Self::DnsRecord(_) => ResourceKind::DnsRecord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_kinds() {
        let zone = ResourceAttributes::HostedZone(HostedZoneAttributes {
            zone_name: DomainName::new("docs.example.com").unwrap(),
        });
        assert_eq!(zone.kind(), ResourceKind::HostedZone);

        let record = ResourceAttributes::DnsRecord(DnsRecordAttributes {
            record_name: None,
            record_type: RecordType::A,
            target: RecordTarget::Distribution,
        });
        assert_eq!(record.kind(), ResourceKind::DnsRecord);
    }

    #[test]
    fn test_distribution_defaults() {
        let attrs =
            DistributionAttributes::for_aliases(vec![DomainName::new("docs.example.com").unwrap()]);
        assert_eq!(attrs.default_root_object, "index.html");
        assert_eq!(attrs.viewer_protocol_policy, ViewerProtocolPolicy::RedirectToHttps);
        assert_eq!(attrs.allowed_methods, AllowedMethods::GetHeadOptions);
        assert_eq!(attrs.price_class, PriceClass::PriceClass100);
        assert_eq!(attrs.cache_policy.min_ttl_seconds, 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_attributes_serialize_with_kind_tag() {
        let attrs = ResourceAttributes::Bucket(BucketAttributes {
            name_prefix: "docs-www".to_string(),
            block_public_access: true,
            removal_policy: RemovalPolicy::Destroy,
        });
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["kind"], "bucket");
        assert_eq!(json["removal_policy"], "destroy");
    }
}
