// Copyright (c) 2025 - Cowboy AI, Inc.
//! Scoped Credentials
//!
//! Writing into a parent zone owned by another principal requires assuming
//! a role. The result is a [`ScopedCredential`]: a capability that permits
//! delegation writes into exactly one zone until it expires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{DomainName, RoleArn};

/// Credential failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Assuming role {role} failed: {reason}")]
    AssumeRoleDenied { role: String, reason: String },

    #[error("Credential scoped to {scope} cannot write to zone {zone}")]
    OutOfScope { scope: String, zone: String },

    #[error("Credential principal {0} owns the child zone")]
    SamePrincipal(String),

    #[error("Credential for role {0} has expired")]
    Expired(String),

    #[error("Credential provider unavailable: {0}")]
    Unavailable(String),
}

/// Capability to write delegation records into one parent zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedCredential {
    role_arn: RoleArn,
    principal: String,
    scope: DomainName,
    expires_at: DateTime<Utc>,
}

impl ScopedCredential {
    pub fn new(
        role_arn: RoleArn,
        principal: impl Into<String>,
        scope: DomainName,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            role_arn,
            principal: principal.into(),
            scope,
            expires_at,
        }
    }

    pub fn role_arn(&self) -> &RoleArn {
        &self.role_arn
    }

    /// Principal the credential acts as
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Zone this credential may write to
    pub fn scope(&self) -> &DomainName {
        &self.scope
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check the credential may write into `zone` at `now`
    pub fn authorize(&self, zone: &DomainName, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if now >= self.expires_at {
            return Err(CredentialError::Expired(self.role_arn.to_string()));
        }
        if self.scope != *zone {
            return Err(CredentialError::OutOfScope {
                scope: self.scope.to_string(),
                zone: zone.to_string(),
            });
        }
        Ok(())
    }
}

/// Identity and role-assumption port
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Principal the deployment itself runs as (owner of the child zone)
    async fn caller_principal(&self) -> Result<String, CredentialError>;

    /// Assume `role`, restricted to writes in the `scope` zone
    async fn assume_role(
        &self,
        role: &RoleArn,
        scope: &DomainName,
    ) -> Result<ScopedCredential, CredentialError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(expires_at: DateTime<Utc>) -> ScopedCredential {
        ScopedCredential::new(
            RoleArn::new("arn:aws:iam::222222222222:role/ZoneEditor").unwrap(),
            "222222222222",
            DomainName::new("example.com").unwrap(),
            expires_at,
        )
    }

    #[test]
    fn test_authorize_in_scope() {
        let now = Utc::now();
        let cred = credential(now + Duration::hours(1));
        assert!(cred
            .authorize(&DomainName::new("example.com").unwrap(), now)
            .is_ok());
    }

    #[test]
    fn test_authorize_out_of_scope() {
        let now = Utc::now();
        let cred = credential(now + Duration::hours(1));
        assert!(matches!(
            cred.authorize(&DomainName::new("other.com").unwrap(), now),
            Err(CredentialError::OutOfScope { .. })
        ));
    }

    #[test]
    fn test_authorize_expired() {
        let now = Utc::now();
        let cred = credential(now - Duration::seconds(1));
        assert!(matches!(
            cred.authorize(&DomainName::new("example.com").unwrap(), now),
            Err(CredentialError::Expired(_))
        ));
    }
}
