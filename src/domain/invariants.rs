// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Distribution Invariants
//!
//! Business rules that relate several value objects to each other. Single
//! values validate themselves on construction (see [`DomainName`],
//! [`Region`](super::Region)); the rules here need more than one.
//!
//! All functions are pure: no I/O, no mutation, deterministic.

use crate::domain::DomainName;

/// Validation result with detailed error information
pub type InvariantResult = Result<(), InvariantViolation>;

/// Violated cross-value invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Certificate name cannot be validated through the given zone
    #[error("Certificate for {domain} cannot be validated in zone {zone}")]
    CertificateOutsideZone { domain: String, zone: String },

    /// Delegated zone does not sit below its parent
    #[error("Zone {child} is not a subdomain of parent zone {parent}")]
    NotASubdomain { child: String, parent: String },

    /// The delegation credential belongs to the child zone's owner
    #[error("Delegation credential principal {0} must differ from the child zone owner")]
    SamePrincipal(String),

    /// NS record would be empty
    #[error("Delegation requires at least one name server")]
    NoNameServers,

    /// Record name is not a valid relative DNS name
    #[error("Invalid record name: {0}")]
    InvalidRecordName(String),

    /// Bucket name prefix breaks storage naming rules
    #[error("Invalid bucket name prefix: {0}")]
    InvalidBucketPrefix(String),
}

/// Validate a certificate name can be proven through a zone
///
/// # Rules
/// - The name (wildcard label stripped) equals the zone or lies below it
pub fn validate_certificate_domain(domain: &DomainName, zone: &DomainName) -> InvariantResult {
    let effective = if domain.is_wildcard() {
        domain.parent()
    } else {
        Some(domain.clone())
    };

    match effective {
        Some(name) if name == *zone || name.is_subdomain_of(zone) => Ok(()),
        _ => Err(InvariantViolation::CertificateOutsideZone {
            domain: domain.to_string(),
            zone: zone.to_string(),
        }),
    }
}

/// Validate a delegated zone sits strictly below its parent
pub fn validate_delegation_target(child: &DomainName, parent: &DomainName) -> InvariantResult {
    if !child.is_subdomain_of(parent) {
        return Err(InvariantViolation::NotASubdomain {
            child: child.to_string(),
            parent: parent.to_string(),
        });
    }
    Ok(())
}

/// Validate the delegation credential is held by a different principal
///
/// # Rules
/// - The assumed-role principal is never the child zone's owner
pub fn validate_delegation_principals(
    credential_principal: &str,
    child_zone_owner: &str,
) -> InvariantResult {
    if credential_principal == child_zone_owner {
        return Err(InvariantViolation::SamePrincipal(
            credential_principal.to_string(),
        ));
    }
    Ok(())
}

/// Validate the name-server set published in the parent zone
pub fn validate_name_servers(name_servers: &[String]) -> InvariantResult {
    if name_servers.is_empty() || name_servers.iter().any(|ns| ns.trim().is_empty()) {
        return Err(InvariantViolation::NoNameServers);
    }
    Ok(())
}

/// Validate a record name relative to its zone
///
/// # Rules
/// - `None` targets the zone apex
/// - Otherwise one or more valid DNS labels, no trailing dot
pub fn validate_record_name(record_name: Option<&str>, zone: &DomainName) -> InvariantResult {
    let Some(name) = record_name else {
        return Ok(());
    };

    if name.is_empty() || name.ends_with('.') {
        return Err(InvariantViolation::InvalidRecordName(name.to_string()));
    }

    DomainName::new(format!("{}.{}", name, zone))
        .map(|_| ())
        .map_err(|e| InvariantViolation::InvalidRecordName(format!("{}: {}", name, e)))
}

/// Validate a bucket name prefix
///
/// # Rules
/// - 3 to 40 characters, leaving room for a generated suffix
/// - Lowercase letters, digits and hyphens only
/// - Starts and ends with a letter or digit
pub fn validate_bucket_prefix(prefix: &str) -> InvariantResult {
    let valid_len = (3..=40).contains(&prefix.len());
    let valid_chars = prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !prefix.starts_with('-') && !prefix.ends_with('-');

    if !(valid_len && valid_chars && valid_edges) {
        return Err(InvariantViolation::InvalidBucketPrefix(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::new(s).unwrap()
    }

    #[test]
    fn test_validate_certificate_domain() {
        let zone = name("docs.example.com");
        assert!(validate_certificate_domain(&name("docs.example.com"), &zone).is_ok());
        assert!(validate_certificate_domain(&name("www.docs.example.com"), &zone).is_ok());
        assert!(validate_certificate_domain(&name("*.docs.example.com"), &zone).is_ok());

        let result = validate_certificate_domain(&name("example.com"), &zone);
        assert!(matches!(
            result,
            Err(InvariantViolation::CertificateOutsideZone { .. })
        ));
    }

    #[test]
    fn test_validate_delegation_target() {
        assert!(validate_delegation_target(&name("docs.example.com"), &name("example.com")).is_ok());
        assert!(validate_delegation_target(&name("example.com"), &name("example.com")).is_err());
        assert!(validate_delegation_target(&name("docs.other.com"), &name("example.com")).is_err());
    }

    #[test]
    fn test_validate_delegation_principals() {
        assert!(validate_delegation_principals("111111111111", "222222222222").is_ok());
        assert_eq!(
            validate_delegation_principals("111111111111", "111111111111"),
            Err(InvariantViolation::SamePrincipal("111111111111".to_string()))
        );
    }

    #[test]
    fn test_validate_name_servers() {
        assert!(validate_name_servers(&["ns-1.example.net".to_string()]).is_ok());
        assert!(validate_name_servers(&[]).is_err());
        assert!(validate_name_servers(&[" ".to_string()]).is_err());
    }

    #[test]
    fn test_validate_record_name() {
        let zone = name("docs.example.com");
        assert!(validate_record_name(None, &zone).is_ok());
        assert!(validate_record_name(Some("www"), &zone).is_ok());
        assert!(validate_record_name(Some("a.b"), &zone).is_ok());
        assert!(validate_record_name(Some(""), &zone).is_err());
        assert!(validate_record_name(Some("www."), &zone).is_err());
        assert!(validate_record_name(Some("bad_name"), &zone).is_err());
    }

    #[test]
    fn test_validate_bucket_prefix() {
        assert!(validate_bucket_prefix("docs-www").is_ok());
        assert!(validate_bucket_prefix("ab").is_err());
        assert!(validate_bucket_prefix("Docs").is_err());
        assert!(validate_bucket_prefix("-docs").is_err());
        assert!(validate_bucket_prefix(&"a".repeat(41)).is_err());
    }
}
