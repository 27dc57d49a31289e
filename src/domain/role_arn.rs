// Copyright (c) 2025 - Cowboy AI, Inc.
//! IAM Role ARN Value Object
//!
//! The parent hosted zone is owned by a different account. Writes into it
//! go through a role that account exposes; this type carries that role's
//! identity and the owning account.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleArnError {
    #[error("Role ARN is empty")]
    Empty,

    #[error("Role ARN must have the form arn:<partition>:iam::<account>:role/<name>, got {0}")]
    Malformed(String),

    #[error("Invalid account id in role ARN: {0}")]
    InvalidAccount(String),
}

/// `arn:aws:iam::123456789012:role/ParentZoneEditor`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleArn {
    raw: String,
    account_id: String,
    role_name: String,
}

impl RoleArn {
    pub fn new(arn: impl Into<String>) -> Result<Self, RoleArnError> {
        let raw = arn.into();
        if raw.is_empty() {
            return Err(RoleArnError::Empty);
        }

        // arn : partition : service : region : account : resource
        let parts: Vec<&str> = raw.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[1].is_empty() || parts[2] != "iam" {
            return Err(RoleArnError::Malformed(raw));
        }

        let account_id = parts[4];
        if account_id.len() != 12 || !account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(RoleArnError::InvalidAccount(account_id.to_string()));
        }

        let role_name = match parts[5].strip_prefix("role/") {
            Some(path) if !path.is_empty() => path.rsplit('/').next().unwrap_or(path),
            _ => return Err(RoleArnError::Malformed(raw)),
        };

        Ok(Self {
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            raw,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Account that owns the role (and therefore the parent zone)
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for RoleArn {
    type Err = RoleArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoleArn {
    type Error = RoleArnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleArn> for String {
    fn from(value: RoleArn) -> Self {
        value.raw
    }
}
