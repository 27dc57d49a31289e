// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-static-distribution
//!
//! Provides a deterministic deployment configuration, fast wait settings
//! and orchestrators wired to the in-memory simulation.
//!
//! # Design Principles
//! - Configuration is fixed; nothing is read from the process environment
//! - Waits are measured in milliseconds so failure paths finish quickly
//! - Every orchestrator shares its backend with the caller for assertions

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cim_static_distribution::config::{
    CDN_REGION, DOMAIN_NAME, HOME_REGION, PARENT_ZONE_ROLE, STACK_NAME,
};
use cim_static_distribution::domain::{Region, ResourceKind};
use cim_static_distribution::simulation::{
    InMemoryBackend, SimulatedCertificateAuthority, StaticCredentialProvider,
};
use cim_static_distribution::{
    Deployment, DeploymentConfig, DistributionBlueprint, Orchestrator, OrchestratorConfig,
    ResourceAddress, WaitConfig,
};

/// Principal the deployment runs as
pub const CALLER: &str = "111111111111";
/// Account owning the parent zone (and its editor role)
pub const PARENT_ACCOUNT: &str = "222222222222";

pub const HOME: &str = "eu-west-1";
pub const CDN: &str = "us-east-1";

pub fn config() -> DeploymentConfig {
    let env: HashMap<&str, String> = [
        (STACK_NAME, "docs".to_string()),
        (DOMAIN_NAME, "example.com".to_string()),
        (
            PARENT_ZONE_ROLE,
            format!("arn:aws:iam::{}:role/ZoneEditor", PARENT_ACCOUNT),
        ),
        (HOME_REGION, HOME.to_string()),
        (CDN_REGION, CDN.to_string()),
    ]
    .into_iter()
    .collect();
    DeploymentConfig::from_lookup(|name| env.get(name).cloned()).expect("Invalid fixture config")
}

pub fn deployment() -> Deployment {
    DistributionBlueprint::new(config())
        .deployment()
        .expect("Fixture graph must partition")
}

/// Millisecond-scale backoff with a hard deadline
pub fn fast_wait(timeout: Duration) -> WaitConfig {
    WaitConfig {
        initial_delay: Duration::from_millis(2),
        max_delay: Duration::from_millis(20),
        timeout,
        jitter: false,
    }
}

pub fn orchestrator_config(max_parallel: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        max_parallel,
        validation: fast_wait(Duration::from_secs(5)),
        propagation: fast_wait(Duration::from_secs(5)),
    }
}

/// Orchestrator whose certificates validate and whose roles can be assumed
pub fn orchestrator(backend: &Arc<InMemoryBackend>, max_parallel: usize) -> Orchestrator {
    orchestrator_with(
        backend,
        SimulatedCertificateAuthority::new(backend.clone()),
        StaticCredentialProvider::new(CALLER),
        orchestrator_config(max_parallel),
    )
}

/// Orchestrator reporting to an authority the caller keeps a handle on
pub fn orchestrator_sharing(
    backend: &Arc<InMemoryBackend>,
    authority: &Arc<SimulatedCertificateAuthority>,
    max_parallel: usize,
) -> Orchestrator {
    Orchestrator::new(
        backend.clone(),
        Arc::new(StaticCredentialProvider::new(CALLER)),
        authority.clone(),
        orchestrator_config(max_parallel),
    )
}

pub fn orchestrator_with(
    backend: &Arc<InMemoryBackend>,
    authority: SimulatedCertificateAuthority,
    credentials: StaticCredentialProvider,
    config: OrchestratorConfig,
) -> Orchestrator {
    Orchestrator::new(
        backend.clone(),
        Arc::new(credentials),
        Arc::new(authority),
        config,
    )
}

pub fn address(kind: ResourceKind, region: &str, name: &str) -> ResourceAddress {
    ResourceAddress::new(kind, Region::new(region).expect("Invalid region"), name)
}
