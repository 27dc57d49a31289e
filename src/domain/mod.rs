// Copyright (c) 2025 - Cowboy AI, Inc.
//! Distribution Domain Models
//!
//! Value objects with validation invariants used throughout the resource
//! graph. Each value validates itself on construction; rules relating
//! several values live in [`invariants`].
//!
//! # Value Objects with Invariants
//!
//! - [`DomainName`] - DNS-validated names (RFC 1123, leading wildcard allowed)
//! - [`Region`] - Cloud service region identifier
//! - [`RoleArn`] - Role identity used for cross-account zone delegation
//! - [`ResourceKind`] - Closed taxonomy of distribution resources

pub mod domain_name;
pub mod invariants;
pub mod region;
pub mod resource_kind;
pub mod role_arn;

// Re-export value objects
pub use domain_name::{DomainName, DomainNameError};
pub use invariants::{InvariantResult, InvariantViolation};
pub use region::{Region, RegionError};
pub use resource_kind::{ResourceCategory, ResourceKind, UnknownResourceKind};
pub use role_arn::{RoleArn, RoleArnError};
