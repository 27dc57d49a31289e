// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain Name Value Object with DNS Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Domain name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainNameError {
    #[error("Domain name is empty")]
    Empty,

    #[error("Domain name exceeds maximum length of 253 characters: {0}")]
    TooLong(usize),

    #[error("Label exceeds maximum length of 63 characters: {0}")]
    LabelTooLong(String),

    #[error("Invalid character in domain name: {0}")]
    InvalidCharacter(char),

    #[error("Label cannot start or end with hyphen: {0}")]
    InvalidLabelFormat(String),

    #[error("Top-level label cannot be all numeric: {0}")]
    NumericLabel(String),

    #[error("Wildcard is only allowed as the whole first label: {0}")]
    MisplacedWildcard(String),
}

/// Fully qualified domain name used for zones, certificates and aliases
///
/// Follows RFC 1123 with the following invariants:
/// - Total length ≤ 253 characters
/// - Each label ≤ 63 characters
/// - Labels contain only alphanumeric characters and hyphens
/// - Labels cannot start or end with hyphens
/// - The last label cannot be all numeric
/// - At most one `*`, and only as the entire first label
///
/// Names are stored lowercase without a trailing dot.
///
/// # Examples
///
/// ```rust
/// use cim_static_distribution::domain::DomainName;
///
/// let base = DomainName::new("example.com").unwrap();
/// let project = base.subdomain("docs").unwrap();
/// assert_eq!(project.as_str(), "docs.example.com");
/// assert!(project.is_subdomain_of(&base));
///
/// assert!(DomainName::new("").is_err());
/// assert!(DomainName::new("-invalid.com").is_err());
/// assert!(DomainName::new("a.*.example.com").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Maximum total length for an FQDN (RFC 1123)
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label (RFC 1123)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a new domain name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, DomainNameError> {
        let name = name.into();
        let name = name.trim_end_matches('.').to_ascii_lowercase();

        if name.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(DomainNameError::TooLong(name.len()));
        }

        let labels: Vec<&str> = name.split('.').collect();
        let last = labels.len() - 1;
        for (index, label) in labels.iter().enumerate() {
            if label.contains('*') {
                if index != 0 || *label != "*" || labels.len() == 1 {
                    return Err(DomainNameError::MisplacedWildcard(name.clone()));
                }
                continue;
            }
            Self::validate_label(label, index == last)?;
        }

        Ok(Self(name))
    }

    fn validate_label(label: &str, is_tld: bool) -> Result<(), DomainNameError> {
        if label.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if label.len() > Self::MAX_LABEL_LENGTH {
            return Err(DomainNameError::LabelTooLong(label.to_string()));
        }

        for ch in label.chars() {
            if !ch.is_ascii_alphanumeric() && ch != '-' {
                return Err(DomainNameError::InvalidCharacter(ch));
            }
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainNameError::InvalidLabelFormat(label.to_string()));
        }

        if is_tld && label.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainNameError::NumericLabel(label.to_string()));
        }

        Ok(())
    }

    /// Get the domain name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix this name with a single label (`docs` + `example.com`)
    pub fn subdomain(&self, label: &str) -> Result<Self, DomainNameError> {
        Self::new(format!("{}.{}", label, self.0))
    }

    /// The enclosing domain, if this name has more than one label
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_once('.')
            .map(|(_, parent)| Self(parent.to_string()))
    }

    /// Whether this name lies strictly below `other`
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.0.len() > other.0.len() && self.0.ends_with(&format!(".{}", other.0))
    }

    /// Whether the first label is a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.0.starts_with("*.")
    }

    /// Get labels as a vector
    pub fn labels(&self) -> Vec<&str> {
        self.0.split('.').collect()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}
