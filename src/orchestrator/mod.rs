// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestrator
//!
//! Drives a [`Deployment`] through its node lifecycles. Apply walks the
//! graph dependencies-first; teardown walks it dependents-first. Both use
//! the same scheduler:
//!
//! - A node starts only when its neighbours in the walk direction have
//!   reached the target state, re-checked every time a node settles
//! - Up to `max_parallel` independent nodes run concurrently, picked in
//!   priority order, inside one task (`FuturesUnordered`)
//! - A failed node blocks its branch; unrelated branches keep going
//! - Cancellation is honoured between transitions
//!
//! Every run ends with a [`RunReport`].

pub mod deployment;
pub mod report;

pub use deployment::Deployment;
pub use report::{
    BlockedNode, FailureCause, NodeFailure, NodeRef, NodeWarning, RunMode, RunReport,
};

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::{
    outputs, ApplyRequest, BackendError, InputBinding, ProvisioningBackend, RemoteStatus,
    ResourceAddress, ResourceOutputs,
};
use crate::credentials::CredentialProvider;
use crate::delegation::DelegationHandshake;
use crate::domain::DomainName;
use crate::graph::{NodeId, RemovalPolicy, ResourceAttributes, ResourceNode};
use crate::state_machine::{
    LifecycleCommand, NodeLifecycle, NodeStatus, TransitionError, TransitionOutput,
};
use crate::validation::{CertificateAuthority, CertificateOrder, ValidationWaiter};
use crate::wait::{wait_for, WaitConfig, WaitError};
use deployment::StatusBoard;

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Nodes in flight at once; 0 is treated as 1
    pub max_parallel: usize,
    /// Certificate validation backoff
    pub validation: WaitConfig,
    /// Waiting for records and in-progress resources to become visible
    pub propagation: WaitConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            validation: WaitConfig::default(),
            propagation: WaitConfig {
                initial_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(30),
                timeout: Duration::from_secs(10 * 60),
                jitter: true,
            },
        }
    }
}

/// How a node reached its target state
#[derive(Debug)]
enum Completion {
    Applied(ResourceOutputs),
    Deleted,
    AlreadyAbsent,
    Retained,
}

type NodeOutcome = (NodeId, Result<Completion, FailureCause>);

/// Applies and tears down deployments
pub struct Orchestrator {
    backend: Arc<dyn ProvisioningBackend>,
    credentials: Arc<dyn CredentialProvider>,
    delegation: DelegationHandshake,
    waiter: ValidationWaiter,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ProvisioningBackend>,
        credentials: Arc<dyn CredentialProvider>,
        authority: Arc<dyn CertificateAuthority>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            delegation: DelegationHandshake::new(backend.clone()),
            waiter: ValidationWaiter::new(backend.clone(), authority, config.validation.clone()),
            backend,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Bring every node to Ready
    ///
    /// Ready nodes from earlier runs are skipped; Failed ones are retried.
    pub async fn apply(&self, deployment: &mut Deployment, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::start(RunMode::Apply);
        let refs = node_refs(deployment);

        {
            let mut board = deployment.board.lock();
            for id in deployment.topological_order() {
                let Some(lifecycle) = board.get_mut(id) else {
                    continue;
                };
                match lifecycle.status() {
                    NodeStatus::Ready => report.skipped.extend(refs.get(id).cloned()),
                    NodeStatus::Failed | NodeStatus::Deleted => {
                        match step(lifecycle, *id, LifecycleCommand::Retry) {
                            Ok(output) => report.note(refs.get(id), output),
                            Err(e) => warn!(node = %id, error = %e, "Cannot reset node for retry"),
                        }
                    }
                    _ => {}
                }
            }
        }

        let priority = deployment.topological_order().to_vec();
        self.run(deployment, &priority, &refs, cancel, &mut report)
            .await;
        report.finish();
        report
    }

    /// Bring every node to Deleted
    ///
    /// Nodes are removed in reverse apply order; a resource that is already
    /// gone counts as deleted.
    pub async fn teardown(
        &self,
        deployment: &mut Deployment,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::start(RunMode::Teardown);
        let refs = node_refs(deployment);

        for (id, status) in deployment.statuses() {
            if status == NodeStatus::Deleted {
                report.skipped.extend(refs.get(&id).cloned());
            }
        }

        let mut priority: Vec<NodeId> = deployment.apply_order().iter().rev().copied().collect();
        for id in deployment.topological_order().iter().rev() {
            if !priority.contains(id) {
                priority.push(*id);
            }
        }

        self.run(deployment, &priority, &refs, cancel, &mut report)
            .await;
        report.finish();
        report
    }

    #[instrument(skip_all, fields(run_id = %report.run_id, mode = ?report.mode))]
    async fn run(
        &self,
        deployment: &mut Deployment,
        priority: &[NodeId],
        refs: &BTreeMap<NodeId, NodeRef>,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) {
        let mode = report.mode;
        let max_parallel = self.config.max_parallel.max(1);
        info!(nodes = priority.len(), max_parallel, "Run started");

        let mut attempted: BTreeSet<NodeId> = BTreeSet::new();
        let mut in_flight: BTreeSet<NodeId> = BTreeSet::new();
        let mut running: FuturesUnordered<BoxFuture<'_, NodeOutcome>> = FuturesUnordered::new();

        loop {
            if !cancel.is_cancelled() {
                let statuses = deployment.statuses();
                for id in priority {
                    if in_flight.len() >= max_parallel {
                        break;
                    }
                    if attempted.contains(id) || !is_eligible(deployment, &statuses, mode, *id) {
                        continue;
                    }
                    attempted.insert(*id);
                    match self.launch(deployment, refs, report, mode, *id, cancel) {
                        Ok(future) => {
                            in_flight.insert(*id);
                            running.push(future);
                        }
                        Err(cause) => record_failure(deployment, refs, report, *id, cause),
                    }
                }
            }

            if running.is_empty() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = running.next() => next,
            };
            let Some((id, result)) = next else {
                break;
            };
            in_flight.remove(&id);
            self.settle(deployment, refs, report, id, result);
        }

        drop(running);

        if cancel.is_cancelled() {
            report.cancelled = true;
            for id in &in_flight {
                record_failure(deployment, refs, report, *id, FailureCause::Cancelled);
            }
            let statuses = deployment.statuses();
            for id in priority {
                let untouched = match mode {
                    RunMode::Apply => statuses.get(id) == Some(&NodeStatus::Pending),
                    RunMode::Teardown => statuses.get(id) != Some(&NodeStatus::Deleted),
                };
                if untouched && !attempted.contains(id) {
                    report.not_started.extend(refs.get(id).cloned());
                }
            }
            warn!(
                in_flight = in_flight.len(),
                not_started = report.not_started.len(),
                "Run cancelled"
            );
        } else {
            collect_blocked(deployment, refs, report, priority, &attempted);
        }

        info!(
            completed = report.completed.len(),
            failed = report.failures.len(),
            blocked = report.blocked.len(),
            "Run finished"
        );
    }

    /// Move a node into its in-flight state and build its future
    fn launch<'s>(
        &'s self,
        deployment: &Deployment,
        refs: &BTreeMap<NodeId, NodeRef>,
        report: &mut RunReport,
        mode: RunMode,
        id: NodeId,
        cancel: &CancellationToken,
    ) -> Result<BoxFuture<'s, NodeOutcome>, FailureCause> {
        let node = deployment
            .node(id)
            .cloned()
            .ok_or_else(|| missing_node(id))?;
        let address = deployment.address(id).ok_or_else(|| unplaced(&node))?;

        let command = match mode {
            RunMode::Apply => LifecycleCommand::BeginApply,
            RunMode::Teardown => LifecycleCommand::BeginTeardown,
        };
        if let Some(lifecycle) = deployment.board.lock().get_mut(&id) {
            report.note(refs.get(&id), step(lifecycle, id, command)?);
        }
        debug!(node = %node.name, kind = %node.kind, region = %address.region, ?mode, "Node started");

        let cancel = cancel.clone();
        match mode {
            RunMode::Apply => {
                let inputs = deployment.inputs_for(id).map_err(|dependency| {
                    FailureCause::MissingInput {
                        dependency,
                        output: "*".to_string(),
                    }
                })?;
                let validation_zone = validation_zone_of(deployment, id);
                let board = Arc::clone(&deployment.board);
                Ok(async move {
                    let result = self
                        .apply_node(node, address, inputs, validation_zone, board, cancel)
                        .await;
                    (id, result)
                }
                .boxed())
            }
            RunMode::Teardown => {
                let stored = deployment.outputs(id).cloned();
                Ok(async move { (id, self.delete_node(node, address, stored).await) }.boxed())
            }
        }
    }

    async fn apply_node(
        &self,
        node: ResourceNode,
        address: ResourceAddress,
        inputs: Vec<InputBinding>,
        validation_zone: Option<DomainName>,
        board: StatusBoard,
        cancel: CancellationToken,
    ) -> Result<Completion, FailureCause> {
        match &node.attributes {
            ResourceAttributes::Certificate(attrs) => {
                let order = CertificateOrder {
                    node: node.id,
                    name: node.name.clone(),
                    domain: attrs.domain_name.clone(),
                    validation_zone: validation_zone.unwrap_or_else(|| attrs.domain_name.clone()),
                    region: address.region.clone(),
                    inputs,
                };
                let handle = self.waiter.request_certificate(&order).await?;
                await_external(&board, node.id)?;
                let outputs = self
                    .waiter
                    .wait_for_validation(&handle, Some(&cancel))
                    .await?;
                Ok(Completion::Applied(outputs))
            }
            ResourceAttributes::DelegationRecord(attrs) => {
                let owner = self.credentials.caller_principal().await?;
                let credential = self
                    .credentials
                    .assume_role(&attrs.delegation_role, &attrs.parent_zone)
                    .await?;
                let request = ApplyRequest {
                    node: node.id,
                    address: address.clone(),
                    attributes: node.attributes.clone(),
                    inputs,
                    credential: Some(credential),
                };
                let result = self.delegation.begin_delegation(&request, &owner).await?;
                debug!(node = %node.name, outcome = ?result.outcome, "Delegation submitted");

                await_external(&board, node.id)?;
                let mut outputs = result.outputs;
                outputs.extend(
                    self.delegation
                        .await_propagation(&address, &self.config.propagation, Some(&cancel))
                        .await?,
                );
                Ok(Completion::Applied(outputs))
            }
            _ => {
                let request = ApplyRequest {
                    node: node.id,
                    address,
                    attributes: node.attributes.clone(),
                    inputs,
                    credential: None,
                };
                self.create_or_adopt(&request, &board, &cancel)
                    .await
                    .map(Completion::Applied)
            }
        }
    }

    /// Adopt the remote resource if it exists, create it otherwise
    async fn create_or_adopt(
        &self,
        request: &ApplyRequest,
        board: &StatusBoard,
        cancel: &CancellationToken,
    ) -> Result<ResourceOutputs, FailureCause> {
        let address = &request.address;
        match self.backend.read_status(address).await? {
            RemoteStatus::Present(outputs) => {
                info!(%address, "Adopting existing resource");
                Ok(outputs)
            }
            RemoteStatus::InProgress => {
                await_external(board, request.node)?;
                self.await_present(address, cancel).await
            }
            RemoteStatus::Absent => match self.backend.create(request).await {
                Ok(outputs) => {
                    info!(%address, "Resource created");
                    Ok(outputs)
                }
                Err(BackendError::AlreadyExists(_)) => {
                    debug!(%address, "Created concurrently, adopting");
                    match self.backend.read_status(address).await? {
                        RemoteStatus::Present(outputs) => Ok(outputs),
                        _ => Err(BackendError::AlreadyExists(address.clone()).into()),
                    }
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn await_present(
        &self,
        address: &ResourceAddress,
        cancel: &CancellationToken,
    ) -> Result<ResourceOutputs, FailureCause> {
        let waited = wait_for(
            &self.config.propagation,
            Some(cancel),
            || async {
                Ok::<_, BackendError>(matches!(
                    self.backend.read_status(address).await?,
                    RemoteStatus::Present(_)
                ))
            },
            &address.name,
        )
        .await;

        match waited {
            Ok(_) => {}
            Err(WaitError::Cancelled(_)) => return Err(FailureCause::Cancelled),
            Err(WaitError::Check { cause, .. }) => return Err(cause.into()),
            Err(timeout @ WaitError::Timeout { .. }) => {
                return Err(BackendError::Unavailable(timeout.to_string()).into())
            }
        }

        match self.backend.read_status(address).await? {
            RemoteStatus::Present(outputs) => Ok(outputs),
            _ => Err(BackendError::NotFound(address.clone()).into()),
        }
    }

    async fn delete_node(
        &self,
        node: ResourceNode,
        address: ResourceAddress,
        stored: Option<ResourceOutputs>,
    ) -> Result<Completion, FailureCause> {
        match &node.attributes {
            ResourceAttributes::Bucket(attrs) if attrs.removal_policy == RemovalPolicy::Retain => {
                info!(%address, "Bucket retained by removal policy");
                Ok(Completion::Retained)
            }
            ResourceAttributes::Certificate(attrs) => {
                let record = ValidationWaiter::record_address(&node.name, &address.region);
                let certificate_id = match stored
                    .as_ref()
                    .and_then(|o| o.scalar(outputs::CERTIFICATE_ID))
                {
                    Some(id) => Some(id.to_string()),
                    None => {
                        self.waiter
                            .find_existing(&attrs.domain_name, &address.region)
                            .await?
                    }
                };
                match certificate_id {
                    Some(id) => self.waiter.release(&id, &record).await?,
                    None => match self.backend.delete(&record).await {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e.into()),
                    },
                }
                Ok(Completion::Deleted)
            }
            ResourceAttributes::DelegationRecord(attrs) => {
                let credential = self
                    .credentials
                    .assume_role(&attrs.delegation_role, &attrs.parent_zone)
                    .await?;
                let removed = self
                    .delegation
                    .withdraw(&address, &attrs.parent_zone, &credential)
                    .await?;
                Ok(if removed {
                    Completion::Deleted
                } else {
                    Completion::AlreadyAbsent
                })
            }
            _ => match self.backend.delete(&address).await {
                Ok(()) => {
                    info!(%address, "Resource deleted");
                    Ok(Completion::Deleted)
                }
                Err(e) if e.is_not_found() => Ok(Completion::AlreadyAbsent),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Record a finished node
    fn settle(
        &self,
        deployment: &mut Deployment,
        refs: &BTreeMap<NodeId, NodeRef>,
        report: &mut RunReport,
        id: NodeId,
        result: Result<Completion, FailureCause>,
    ) {
        let completion = match result {
            Ok(completion) => completion,
            Err(cause) => return record_failure(deployment, refs, report, id, cause),
        };

        let transition = deployment
            .board
            .lock()
            .get_mut(&id)
            .map(|lifecycle| step(lifecycle, id, LifecycleCommand::Complete));
        if let Some(Err(e)) = transition {
            return record_failure(deployment, refs, report, id, e.into());
        }

        let name = deployment.graph().graph().name_of(id);
        match completion {
            Completion::Applied(outputs) => {
                info!(node = %name, outputs = outputs.iter().count(), "Node ready");
                deployment.outputs.insert(id, outputs);
                deployment.applied.push(id);
                report.completed.extend(refs.get(&id).cloned());
            }
            Completion::Retained => {
                deployment.outputs.remove(&id);
                deployment.applied.retain(|n| *n != id);
                report.retained.extend(refs.get(&id).cloned());
            }
            gone @ (Completion::Deleted | Completion::AlreadyAbsent) => {
                let absent = matches!(gone, Completion::AlreadyAbsent);
                info!(node = %name, already_absent = absent, "Node deleted");
                deployment.outputs.remove(&id);
                deployment.applied.retain(|n| *n != id);
                report.completed.extend(refs.get(&id).cloned());
            }
        }
    }
}

fn node_refs(deployment: &Deployment) -> BTreeMap<NodeId, NodeRef> {
    deployment
        .graph()
        .graph()
        .nodes()
        .map(|node| (node.id, NodeRef::from(node)))
        .collect()
}

/// Neighbours a node waits for, in walk direction
fn prerequisites(deployment: &Deployment, mode: RunMode, id: NodeId) -> Vec<NodeId> {
    let graph = deployment.graph().graph();
    match mode {
        RunMode::Apply => graph.dependencies_of(id).map(|e| e.to).collect(),
        RunMode::Teardown => graph.dependents_of(id).map(|e| e.from).collect(),
    }
}

fn is_eligible(
    deployment: &Deployment,
    statuses: &BTreeMap<NodeId, NodeStatus>,
    mode: RunMode,
    id: NodeId,
) -> bool {
    let (startable, target) = match (mode, statuses.get(&id)) {
        (RunMode::Apply, Some(NodeStatus::Pending)) => (true, NodeStatus::Ready),
        (
            RunMode::Teardown,
            Some(NodeStatus::Pending | NodeStatus::Ready | NodeStatus::Failed),
        ) => (true, NodeStatus::Deleted),
        _ => (false, NodeStatus::Pending),
    };
    startable
        && prerequisites(deployment, mode, id)
            .iter()
            .all(|p| statuses.get(p) == Some(&target))
}

/// Apply a lifecycle command and log the warnings it raises
fn step(
    lifecycle: &mut NodeLifecycle,
    id: NodeId,
    command: LifecycleCommand,
) -> Result<TransitionOutput, TransitionError> {
    let output = lifecycle.apply(command)?;
    for warning in &output.warnings {
        if output.is_critical {
            warn!(node = %id, ?command, %warning, "Lifecycle transition");
        } else {
            debug!(node = %id, ?command, %warning, "Lifecycle transition");
        }
    }
    Ok(output)
}

fn await_external(board: &StatusBoard, id: NodeId) -> Result<(), FailureCause> {
    if let Some(lifecycle) = board.lock().get_mut(&id) {
        step(lifecycle, id, LifecycleCommand::AwaitExternal)?;
    }
    Ok(())
}

/// Zone named by the certificate's hosted-zone dependency
fn validation_zone_of(deployment: &Deployment, id: NodeId) -> Option<DomainName> {
    let graph = deployment.graph().graph();
    graph
        .dependencies_of(id)
        .filter_map(|edge| graph.node(edge.to))
        .find_map(|node| match &node.attributes {
            ResourceAttributes::HostedZone(attrs) => Some(attrs.zone_name.clone()),
            _ => None,
        })
}

fn record_failure(
    deployment: &Deployment,
    refs: &BTreeMap<NodeId, NodeRef>,
    report: &mut RunReport,
    id: NodeId,
    cause: FailureCause,
) {
    if let Some(lifecycle) = deployment.board.lock().get_mut(&id) {
        if lifecycle.status().is_in_flight() {
            if let Err(e) = step(lifecycle, id, LifecycleCommand::Fail) {
                warn!(node = %id, error = %e, "Cannot mark node failed");
            }
        }
    }
    let Some(node) = refs.get(&id).cloned() else {
        return;
    };
    warn!(node = %node.name, kind = %node.kind, cause = %cause, "Node failed");
    report.failures.push(NodeFailure { node, cause });
}

/// Attribute every untouched node to the failed node cutting it off
fn collect_blocked(
    deployment: &Deployment,
    refs: &BTreeMap<NodeId, NodeRef>,
    report: &mut RunReport,
    priority: &[NodeId],
    attempted: &BTreeSet<NodeId>,
) {
    let mode = report.mode;
    let failed: BTreeSet<NodeId> = report.failures.iter().map(|f| f.node.id).collect();
    let statuses = deployment.statuses();
    let done = match mode {
        RunMode::Apply => NodeStatus::Ready,
        RunMode::Teardown => NodeStatus::Deleted,
    };

    // Walk order puts every prerequisite before the node it gates.
    let walk: Vec<NodeId> = match mode {
        RunMode::Apply => deployment.topological_order().to_vec(),
        RunMode::Teardown => deployment.topological_order().iter().rev().copied().collect(),
    };
    let mut blocker: BTreeMap<NodeId, NodeId> = BTreeMap::new();

    for id in walk {
        if attempted.contains(&id) || statuses.get(&id) == Some(&done) || !priority.contains(&id) {
            continue;
        }
        let root = prerequisites(deployment, mode, id).into_iter().find_map(|p| {
            if failed.contains(&p) {
                Some(p)
            } else {
                blocker.get(&p).copied()
            }
        });
        match root.and_then(|r| refs.get(&r).cloned().map(|by| (r, by))) {
            Some((root, blocked_by)) => {
                blocker.insert(id, root);
                if let Some(node) = refs.get(&id).cloned() {
                    debug!(node = %node.name, blocked_by = %blocked_by.name, "Node blocked");
                    report.blocked.push(BlockedNode { node, blocked_by });
                }
            }
            None => report.not_started.extend(refs.get(&id).cloned()),
        }
    }
}

fn missing_node(id: NodeId) -> FailureCause {
    FailureCause::MissingInput {
        dependency: id.to_string(),
        output: "node".to_string(),
    }
}

fn unplaced(node: &ResourceNode) -> FailureCause {
    FailureCause::MissingInput {
        dependency: node.name.clone(),
        output: "region".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Region, ResourceKind};
    use crate::graph::{BucketAttributes, EdgeKind, HostedZoneAttributes, ResourceGraph};
    use crate::partition::{partition, RegionPolicy};
    use crate::simulation::{
        InMemoryBackend, SimulatedCertificateAuthority, StaticCredentialProvider,
    };
    use pretty_assertions::assert_eq;

    fn region(name: &str) -> Region {
        Region::new(name).unwrap()
    }

    fn bucket(prefix: &str) -> ResourceAttributes {
        ResourceAttributes::Bucket(BucketAttributes {
            name_prefix: prefix.to_string(),
            block_public_access: true,
            removal_policy: RemovalPolicy::Destroy,
        })
    }

    fn zone(name: &str) -> ResourceAttributes {
        ResourceAttributes::HostedZone(HostedZoneAttributes {
            zone_name: DomainName::new(name).unwrap(),
        })
    }

    /// `a` and `b` independent, `c` depends on both
    fn diamond() -> Deployment {
        let mut graph = ResourceGraph::new();
        let a = graph.add_named_node("a", ResourceKind::Bucket, bucket("a"));
        let b = graph.add_named_node("b", ResourceKind::HostedZone, zone("docs.example.com"));
        let c = graph.add_named_node("c", ResourceKind::Bucket, bucket("c"));
        graph.add_edge(c, a, EdgeKind::DependsOn);
        graph.add_edge(c, b, EdgeKind::DependsOn);

        let policy = RegionPolicy::new(region("eu-west-1"));
        Deployment::new(partition(&graph, &policy).unwrap()).unwrap()
    }

    fn orchestrator(backend: Arc<InMemoryBackend>, max_parallel: usize) -> Orchestrator {
        Orchestrator::new(
            backend.clone(),
            Arc::new(StaticCredentialProvider::new("111111111111")),
            Arc::new(SimulatedCertificateAuthority::new(backend)),
            OrchestratorConfig {
                max_parallel,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_apply_reaches_ready() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut deployment = diamond();
        let report = orchestrator(backend.clone(), 2)
            .apply(&mut deployment, &CancellationToken::new())
            .await;

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.completed_names().last(), Some(&"c"));
        for name in ["a", "b", "c"] {
            assert_eq!(deployment.status_of(name), Some(NodeStatus::Ready));
            assert!(deployment.outputs_of(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_only() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_on("b", "quota exceeded");
        let mut deployment = diamond();
        let report = orchestrator(backend, 1)
            .apply(&mut deployment, &CancellationToken::new())
            .await;

        assert!(!report.is_success());
        assert_eq!(report.completed_names(), vec!["a"]);
        assert_eq!(report.failure_of("b").map(FailureCause::label), Some("backend"));
        assert_eq!(report.blocker_of("c"), Some("b"));
        assert_eq!(deployment.status_of("c"), Some(NodeStatus::Pending));
    }

    #[tokio::test]
    async fn test_existing_resource_is_adopted() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut deployment = diamond();
        let id = deployment.graph().graph().find("a").unwrap();
        let address = deployment.address(id).unwrap();
        backend.seed(
            address,
            bucket("a"),
            ResourceOutputs::new().with_scalar(outputs::BUCKET_NAME, "a-existing"),
        );

        let report = orchestrator(backend.clone(), 4)
            .apply(&mut deployment, &CancellationToken::new())
            .await;

        assert!(report.is_success());
        assert!(!backend.created().contains(&"a".to_string()));
        assert_eq!(
            deployment
                .outputs_of("a")
                .and_then(|o| o.scalar(outputs::BUCKET_NAME)),
            Some("a-existing")
        );
    }

    #[tokio::test]
    async fn test_teardown_reverses_apply_order() {
        let backend = Arc::new(InMemoryBackend::new());
        let orchestrator = orchestrator(backend.clone(), 1);
        let mut deployment = diamond();
        orchestrator
            .apply(&mut deployment, &CancellationToken::new())
            .await;
        let applied = deployment.apply_order_names();

        let report = orchestrator
            .teardown(&mut deployment, &CancellationToken::new())
            .await;

        assert!(report.is_success());
        let mut expected = applied;
        expected.reverse();
        assert_eq!(backend.deleted(), expected);
        assert!(deployment.apply_order().is_empty());
    }

    #[tokio::test]
    async fn test_zero_parallelism_still_progresses() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut deployment = diamond();
        let report = orchestrator(backend, 0)
            .apply(&mut deployment, &CancellationToken::new())
            .await;
        assert_eq!(report.completed.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_touches_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut deployment = diamond();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = orchestrator(backend.clone(), 4)
            .apply(&mut deployment, &cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.not_started.len(), 3);
        assert!(backend.journal().is_empty());
    }
}
