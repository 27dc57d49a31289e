// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Configuration
//!
//! Every required value must be present before a graph is built. Values
//! come from the environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `STACK_NAME` | Project name, also the subdomain label |
//! | `DOMAIN_NAME` | Base domain owning the parent hosted zone |
//! | `PARENT_HOSTED_ZONE_EDITOR_ROLE_ARN` | Role allowed to write the parent zone |
//! | `HOME_REGION` | Region of the origin bucket |
//! | `CDN_REGION` | Region of certificate, distribution and alias record |
//! | `DNS_RECORD_NAME` | Optional alias label; unset means the zone apex |
//! | `MAX_PARALLEL` | Optional concurrency limit |
//! | `VALIDATION_TIMEOUT_SECS` | Optional certificate validation deadline |

use serde::Serialize;
use std::time::Duration;

use crate::domain::{DomainName, Region, RoleArn};
use crate::orchestrator::OrchestratorConfig;

pub const STACK_NAME: &str = "STACK_NAME";
pub const DOMAIN_NAME: &str = "DOMAIN_NAME";
pub const PARENT_ZONE_ROLE: &str = "PARENT_HOSTED_ZONE_EDITOR_ROLE_ARN";
pub const HOME_REGION: &str = "HOME_REGION";
pub const CDN_REGION: &str = "CDN_REGION";
pub const DNS_RECORD_NAME: &str = "DNS_RECORD_NAME";
pub const MAX_PARALLEL: &str = "MAX_PARALLEL";
pub const VALIDATION_TIMEOUT_SECS: &str = "VALIDATION_TIMEOUT_SECS";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything needed to build the distribution graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentConfig {
    pub stack_name: String,
    pub domain_name: DomainName,
    pub parent_zone_role: RoleArn,
    pub home_region: Region,
    pub cdn_region: Region,
    /// Relative alias label; `None` publishes at the zone apex
    pub record_name: Option<String>,
    #[serde(skip)]
    pub orchestrator: OrchestratorConfig,
}

impl DeploymentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let stack_name = required(STACK_NAME)?.to_lowercase();
        let domain_name = DomainName::new(required(DOMAIN_NAME)?).map_err(invalid(DOMAIN_NAME))?;
        let parent_zone_role =
            RoleArn::new(required(PARENT_ZONE_ROLE)?).map_err(invalid(PARENT_ZONE_ROLE))?;
        let home_region = Region::new(required(HOME_REGION)?).map_err(invalid(HOME_REGION))?;
        let cdn_region = Region::new(required(CDN_REGION)?).map_err(invalid(CDN_REGION))?;

        // Stack name becomes a DNS label.
        domain_name
            .subdomain(&stack_name)
            .map_err(invalid(STACK_NAME))?;

        let record_name = lookup(DNS_RECORD_NAME)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let mut orchestrator = OrchestratorConfig::default();
        if let Some(raw) = lookup(MAX_PARALLEL) {
            orchestrator.max_parallel = raw.trim().parse::<usize>().map_err(invalid(MAX_PARALLEL))?;
        }
        if let Some(raw) = lookup(VALIDATION_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(invalid(VALIDATION_TIMEOUT_SECS))?;
            orchestrator.validation.timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            stack_name,
            domain_name,
            parent_zone_role,
            home_region,
            cdn_region,
            record_name,
            orchestrator,
        })
    }

    /// `<stack>.<domain>`, the name the distribution is served under
    pub fn project_domain(&self) -> Result<DomainName, ConfigError> {
        self.domain_name
            .subdomain(&self.stack_name)
            .map_err(invalid(STACK_NAME))
    }
}

fn invalid<E: std::fmt::Display>(name: &'static str) -> impl Fn(E) -> ConfigError {
    move |err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    }
}
