// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static Distribution CLI
//!
//! Plans and provisions the cross-region resources of a static site.
//!
//! # Usage
//! ```bash
//! # Show partitions, apply order and cross-region edges
//! static-distribution plan --stack-name docs --domain-name example.com ...
//!
//! # Apply against the in-memory simulation
//! static-distribution deploy --simulate
//!
//! # Apply, then tear everything down again, in the simulation
//! static-distribution teardown --simulate
//! ```
//!
//! Every setting falls back to its environment variable (`STACK_NAME`,
//! `DOMAIN_NAME`, `PARENT_HOSTED_ZONE_EDITOR_ROLE_ARN`, `HOME_REGION`,
//! `CDN_REGION`, `DNS_RECORD_NAME`).

use anyhow::{bail, Context, Result};
use cim_static_distribution::config::{
    CDN_REGION, DNS_RECORD_NAME, DOMAIN_NAME, HOME_REGION, PARENT_ZONE_ROLE, STACK_NAME,
};
use cim_static_distribution::simulation::{
    InMemoryBackend, SimulatedCertificateAuthority, StaticCredentialProvider,
};
use cim_static_distribution::{
    DeploymentConfig, DeploymentOutputs, DistributionBlueprint, Orchestrator, RunReport,
    WaitConfig,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Account the simulated deployment runs as
const SIMULATED_CALLER: &str = "111111111111";

#[derive(Parser)]
#[command(name = "static-distribution")]
#[command(about = "Cross-region static content distribution provisioner", long_about = None)]
#[command(version)]
struct Cli {
    /// Project name, used as the subdomain label
    #[arg(long, env = "STACK_NAME")]
    stack_name: Option<String>,

    /// Base domain whose hosted zone receives the delegation
    #[arg(long, env = "DOMAIN_NAME")]
    domain_name: Option<String>,

    /// Role allowed to edit the parent hosted zone
    #[arg(long, env = "PARENT_HOSTED_ZONE_EDITOR_ROLE_ARN")]
    parent_zone_role: Option<String>,

    /// Region of the origin bucket
    #[arg(long, env = "HOME_REGION")]
    home_region: Option<String>,

    /// Region of certificate, distribution and alias record
    #[arg(long, env = "CDN_REGION")]
    cdn_region: Option<String>,

    /// Alias label below the project domain (zone apex when unset)
    #[arg(long, env = "DNS_RECORD_NAME")]
    record_name: Option<String>,

    /// Nodes applied concurrently
    #[arg(long)]
    max_parallel: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the partitioned plan as JSON
    Plan,

    /// Apply every resource
    Deploy {
        /// Run against the in-memory simulation
        #[arg(long)]
        simulate: bool,
    },

    /// Apply, then remove every resource in reverse order
    Teardown {
        /// Run against the in-memory simulation
        #[arg(long)]
        simulate: bool,
    },
}

impl Cli {
    fn deployment_config(&self) -> Result<DeploymentConfig> {
        let mut config = DeploymentConfig::from_lookup(|name| {
            match name {
                STACK_NAME => self.stack_name.clone(),
                DOMAIN_NAME => self.domain_name.clone(),
                PARENT_ZONE_ROLE => self.parent_zone_role.clone(),
                HOME_REGION => self.home_region.clone(),
                CDN_REGION => self.cdn_region.clone(),
                DNS_RECORD_NAME => self.record_name.clone(),
                other => std::env::var(other).ok(),
            }
        })
        .context("Invalid deployment configuration")?;

        if let Some(max_parallel) = self.max_parallel {
            config.orchestrator.max_parallel = max_parallel;
        }
        Ok(config)
    }
}

/// Simulated validation settles in milliseconds, not minutes
fn simulated_wait() -> WaitConfig {
    WaitConfig {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(200),
        timeout: Duration::from_secs(30),
        jitter: true,
    }
}

fn simulated_orchestrator(config: &DeploymentConfig) -> Orchestrator {
    let backend = Arc::new(InMemoryBackend::new());
    let mut orchestrator_config = config.orchestrator.clone();
    orchestrator_config.validation = simulated_wait();
    orchestrator_config.propagation = simulated_wait();

    Orchestrator::new(
        backend.clone(),
        Arc::new(StaticCredentialProvider::new(SIMULATED_CALLER)),
        Arc::new(SimulatedCertificateAuthority::new(backend)),
        orchestrator_config,
    )
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render JSON")?
    );
    Ok(())
}

fn summarize(report: &RunReport) {
    for failure in &report.failures {
        warn!(node = %failure.node.name, cause = %failure.cause, "Failed");
    }
    for blocked in &report.blocked {
        warn!(node = %blocked.node.name, blocked_by = %blocked.blocked_by.name, "Blocked");
    }
    info!(
        run_id = %report.run_id,
        completed = report.completed.len(),
        skipped = report.skipped.len(),
        "Run complete"
    );
}

/// Cancel the run on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after in-flight transitions");
            child.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.deployment_config()?;
    let blueprint = DistributionBlueprint::new(config.clone());
    info!(
        stack = %config.stack_name,
        domain = %config.domain_name,
        home_region = %config.home_region,
        cdn_region = %config.cdn_region,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Plan => {
            let plan = blueprint.plan()?;
            print_json(&serde_json::to_value(&plan)?)?;
        }
        Commands::Deploy { simulate } => {
            if !simulate {
                bail!("No cloud backend is linked into this build; rerun with --simulate");
            }
            let orchestrator = simulated_orchestrator(&config);
            let mut deployment = blueprint.deployment()?;
            let report = orchestrator
                .apply(&mut deployment, &cancel_on_interrupt())
                .await;
            summarize(&report);

            let outputs = DeploymentOutputs::collect(&deployment);
            print_json(&json!({ "report": report, "outputs": outputs }))?;
            if !report.is_success() {
                bail!("Deployment incomplete");
            }
        }
        Commands::Teardown { simulate } => {
            if !simulate {
                bail!("No cloud backend is linked into this build; rerun with --simulate");
            }
            let orchestrator = simulated_orchestrator(&config);
            let cancel = cancel_on_interrupt();
            let mut deployment = blueprint.deployment()?;

            let applied = orchestrator.apply(&mut deployment, &cancel).await;
            summarize(&applied);
            let removed = orchestrator.teardown(&mut deployment, &cancel).await;
            summarize(&removed);

            print_json(&json!({ "apply": applied, "teardown": removed }))?;
            if !removed.is_success() {
                bail!("Teardown incomplete");
            }
        }
    }

    Ok(())
}
