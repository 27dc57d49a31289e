// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cross-region provisioning for static content distributions
//!
//! A static site is modelled as a typed resource graph (bucket, hosted zone,
//! zone delegation, certificate, distribution, alias record). The graph is
//! split into per-region partitions, then applied dependencies-first by an
//! orchestrator that waits on delegation and certificate validation where
//! the outside world has to catch up.
//!
//! ```text
//! DeploymentConfig ─▶ DistributionBlueprint ─▶ ResourceGraph
//!                                                  │ partition
//!                                                  ▼
//!                     RunReport ◀─ Orchestrator ◀─ Deployment
//! ```
//!
//! External systems are reached only through the [`ProvisioningBackend`],
//! [`CredentialProvider`] and [`CertificateAuthority`] ports; [`simulation`]
//! provides in-memory versions of all three.

pub mod backend;
pub mod config;
pub mod credentials;
pub mod delegation;
pub mod distribution;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod orchestrator;
pub mod partition;
pub mod simulation;
pub mod state_machine;
pub mod validation;
pub mod wait;

// Re-export commonly used types
pub use backend::{ProvisioningBackend, ResourceAddress, ResourceOutputs};
pub use config::{ConfigError, DeploymentConfig};
pub use credentials::{CredentialError, CredentialProvider, ScopedCredential};
pub use distribution::{DeploymentOutputs, DeploymentPlan, DistributionBlueprint};
pub use errors::{ProvisioningError, ProvisioningResult};
pub use graph::{Edge, EdgeKind, NodeId, ResourceGraph, ResourceNode};
pub use orchestrator::{Deployment, Orchestrator, OrchestratorConfig, RunReport};
pub use partition::{partition, PartitionedGraph, RegionPolicy};
pub use validation::{CertificateAuthority, ValidationWaiter};
pub use wait::WaitConfig;
