// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment State
//!
//! A [`Deployment`] is one partitioned graph plus everything learnt while
//! applying it: the lifecycle of every node, the outputs of Ready nodes
//! and the order in which nodes became Ready. It outlives individual runs,
//! so a failed apply can be retried and a finished one torn down.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::backend::{InputBinding, ResourceAddress, ResourceOutputs};
use crate::graph::{EdgeKind, GraphResult, NodeId, ResourceNode};
use crate::partition::PartitionedGraph;
use crate::state_machine::{NodeLifecycle, NodeStatus};

/// Lifecycles of every node, shared with in-flight node futures
pub(super) type StatusBoard = Arc<Mutex<BTreeMap<NodeId, NodeLifecycle>>>;

#[derive(Debug)]
pub struct Deployment {
    graph: PartitionedGraph,
    /// Dependencies-first order, fixed at construction
    order: Vec<NodeId>,
    pub(super) board: StatusBoard,
    pub(super) outputs: BTreeMap<NodeId, ResourceOutputs>,
    /// Nodes in the order they became Ready, across runs
    pub(super) applied: Vec<NodeId>,
}

impl Deployment {
    pub fn new(graph: PartitionedGraph) -> GraphResult<Self> {
        let order = graph.graph().topological_order()?;
        let board = order.iter().map(|id| (*id, NodeLifecycle::new())).collect();
        Ok(Self {
            graph,
            order,
            board: Arc::new(Mutex::new(board)),
            outputs: BTreeMap::new(),
            applied: Vec::new(),
        })
    }

    pub fn graph(&self) -> &PartitionedGraph {
        &self.graph
    }

    /// Dependencies-first order
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn status(&self, id: NodeId) -> Option<NodeStatus> {
        self.board.lock().get(&id).map(NodeLifecycle::status)
    }

    /// Status by logical name
    pub fn status_of(&self, name: &str) -> Option<NodeStatus> {
        self.graph.graph().find(name).and_then(|id| self.status(id))
    }

    pub fn statuses(&self) -> BTreeMap<NodeId, NodeStatus> {
        self.board
            .lock()
            .iter()
            .map(|(id, lifecycle)| (*id, lifecycle.status()))
            .collect()
    }

    /// Every status a node has passed through
    pub fn trail(&self, id: NodeId) -> Vec<NodeStatus> {
        self.board
            .lock()
            .get(&id)
            .map(NodeLifecycle::trail)
            .unwrap_or_default()
    }

    /// When a node last entered `status`
    pub fn entered_at(&self, id: NodeId, status: NodeStatus) -> Option<DateTime<Utc>> {
        self.board
            .lock()
            .get(&id)
            .and_then(|lifecycle| lifecycle.entered_at(status))
    }

    pub fn outputs(&self, id: NodeId) -> Option<&ResourceOutputs> {
        self.outputs.get(&id)
    }

    pub fn outputs_of(&self, name: &str) -> Option<&ResourceOutputs> {
        self.graph
            .graph()
            .find(name)
            .and_then(|id| self.outputs.get(&id))
    }

    /// Nodes in the order they became Ready
    pub fn apply_order(&self) -> &[NodeId] {
        &self.applied
    }

    pub fn apply_order_names(&self) -> Vec<String> {
        self.applied
            .iter()
            .map(|id| self.graph.graph().name_of(*id))
            .collect()
    }

    pub(super) fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.graph.graph().node(id)
    }

    pub(super) fn address(&self, id: NodeId) -> Option<ResourceAddress> {
        let node = self.node(id)?;
        let region = node.region.clone()?;
        Some(ResourceAddress::new(node.kind, region, node.name.clone()))
    }

    /// Outputs of every dependency of `id`
    ///
    /// Returns the name of the first dependency without outputs instead.
    pub(super) fn inputs_for(&self, id: NodeId) -> Result<Vec<InputBinding>, String> {
        let graph = self.graph.graph();
        let region = self.graph.region_of(id);
        let mut bound = BTreeSet::new();
        graph
            .dependencies_of(id)
            // A crossing validation gate sits next to its CrossRegionReference
            .filter(|edge| bound.insert(edge.to))
            .map(|edge| {
                let producer = graph.node(edge.to).ok_or_else(|| edge.to.to_string())?;
                let outputs = self
                    .outputs
                    .get(&edge.to)
                    .cloned()
                    .ok_or_else(|| producer.name.clone())?;
                Ok(InputBinding {
                    from: edge.to,
                    name: producer.name.clone(),
                    kind: producer.kind,
                    edge_kind: edge.kind,
                    cross_region: edge.kind == EdgeKind::CrossRegionReference
                        || producer.region.as_ref() != region,
                    outputs,
                })
            })
            .collect()
    }
}
