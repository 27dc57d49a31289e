// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Region Value Object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Region validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("Region is empty")]
    Empty,

    #[error("Invalid region identifier: {0}")]
    Invalid(String),
}

/// Geographic service region (`us-east-1`, `eu-west-1`, ...)
///
/// Regions are lowercase, hyphen-separated, made of letters and digits,
/// and must contain at least one hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    pub fn new(region: impl Into<String>) -> Result<Self, RegionError> {
        let region = region.into();

        if region.is_empty() {
            return Err(RegionError::Empty);
        }

        let well_formed = region.contains('-')
            && region
                .split('-')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        if !well_formed {
            return Err(RegionError::Invalid(region));
        }

        Ok(Self(region))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.0
    }
}
