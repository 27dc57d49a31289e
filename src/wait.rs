// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bounded Waiting with Exponential Backoff
//!
//! Polls an async condition until it holds, the deadline passes, or the
//! caller cancels. Delays grow exponentially (factor 2) from
//! `initial_delay` up to `max_delay`, with optional jitter. The loop
//! sleeps between polls; it never spins. A single check that does not
//! return before the deadline ends the wait with a timeout.

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Backoff and deadline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Delay after the first unsuccessful check
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    /// Cap for exponential growth
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Total time allowed before giving up
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub jitter: bool,
}

impl Default for WaitConfig {
    /// Certificate validation: DNS propagation takes minutes, issuance can
    /// take most of an hour.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(45 * 60),
            jitter: true,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Why a wait ended without the condition holding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError<E> {
    #[error("Timeout waiting for {resource} after {elapsed:?} ({attempts} attempts)")]
    Timeout {
        resource: String,
        elapsed: Duration,
        attempts: u32,
    },

    #[error("Wait for {0} cancelled")]
    Cancelled(String),

    #[error("Check for {resource} failed: {cause}")]
    Check { resource: String, cause: E },
}

/// Poll `check` until it returns `Ok(true)`
///
/// # Returns
/// * `Ok(attempts)` - condition holds
/// * `Err(WaitError::Timeout)` - deadline passed
/// * `Err(WaitError::Cancelled)` - token fired
/// * `Err(WaitError::Check)` - `check` failed; not retried
pub async fn wait_for<F, Fut, E>(
    config: &WaitConfig,
    cancel: Option<&CancellationToken>,
    check: F,
    resource: &str,
) -> Result<u32, WaitError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut delays = backoff(config);

    loop {
        attempts += 1;

        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(WaitError::Cancelled(resource.to_string()));
        }

        let remaining = config.timeout.saturating_sub(start.elapsed());
        let outcome = match tokio::time::timeout(remaining, check()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(resource, attempts, "Check did not return before the deadline");
                return Err(WaitError::Timeout {
                    resource: resource.to_string(),
                    elapsed: start.elapsed(),
                    attempts,
                });
            }
        };

        match outcome {
            Ok(true) => {
                debug!(resource, attempts, "Condition met");
                return Ok(attempts);
            }
            Ok(false) => {}
            Err(cause) => {
                warn!(resource, error = %cause, "Check failed");
                return Err(WaitError::Check {
                    resource: resource.to_string(),
                    cause,
                });
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(WaitError::Timeout {
                resource: resource.to_string(),
                elapsed,
                attempts,
            });
        }

        // Never sleep past the deadline
        let delay = delays
            .next()
            .unwrap_or(config.max_delay)
            .min(config.timeout - elapsed);
        debug!(
            resource,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Not ready, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = async {
                match cancel {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                return Err(WaitError::Cancelled(resource.to_string()));
            }
        }
    }
}

/// Delays between polls: doubling from `initial_delay`, capped at `max_delay`
fn backoff(config: &WaitConfig) -> impl Iterator<Item = Duration> {
    let mut builder = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .without_max_times();
    if config.jitter {
        builder = builder.with_jitter();
    }
    builder.build()
}

/// Serialize durations as whole milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
