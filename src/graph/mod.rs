// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Graph
//!
//! Typed resource nodes connected by directed "depends on" edges. The graph
//! is a plain value: it is built once per deployment invocation from static
//! declarations, validated, and then handed to the partitioner. Nothing in
//! here talks to the outside world.
//!
//! # Edge Direction
//!
//! An edge `from → to` means *`from` consumes `to`*: `to` must be ready
//! before `from` may be applied, and `from` receives the outputs of `to`.
//!
//! ```text
//! Distribution ──DependsOn──────────▶ Bucket
//! Distribution ──ValidationGate─────▶ Certificate ──DependsOn──▶ HostedZone
//! ```
//!
//! # Ordering
//!
//! Apply order is derived only from edges (Kahn's algorithm, ties broken by
//! ascending [`NodeId`]); declaration order carries no meaning.

pub mod attributes;

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};
use std::fmt;

use crate::domain::{Region, ResourceKind};

pub use attributes::{
    AllowedMethods, BucketAttributes, CachePolicy, CertificateAttributes, DelegationAttributes,
    DistributionAttributes, DnsRecordAttributes, HostedZoneAttributes, PriceClass, RecordTarget,
    RecordType, RemovalPolicy, ResourceAttributes, ViewerProtocolPolicy,
};

/// Identifier of a node, unique within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Kind of dependency between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Same-region dependency on the target's outputs
    DependsOn,
    /// Dependency whose endpoints live in different regions
    CrossRegionReference,
    /// Target must have passed external validation first
    ValidationGate,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependsOn => write!(f, "depends_on"),
            Self::CrossRegionReference => write!(f, "cross_region_reference"),
            Self::ValidationGate => write!(f, "validation_gate"),
        }
    }
}

/// Directed edge: `from` consumes `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    /// Logical name, unique within the graph
    pub name: String,
    pub kind: ResourceKind,
    /// Region assigned by the partitioner
    pub region: Option<Region>,
    /// Hard placement constraint declared on this node
    pub pinned_region: Option<Region>,
    pub attributes: ResourceAttributes,
}

/// Dependency cycle, listed consumer first
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Dependency cycle: {}", .names.join(" -> "))]
pub struct CycleError {
    pub path: Vec<NodeId>,
    pub names: Vec<String>,
}

/// Edge or pin naming a node that is not in the graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Edge {from} -> {to} references missing node {missing}")]
pub struct DanglingReferenceError {
    pub from: NodeId,
    pub to: NodeId,
    pub missing: NodeId,
}

/// Graph construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    DanglingReference(#[from] DanglingReferenceError),

    #[error("Node {node} is declared as {declared} but carries {actual} attributes")]
    AttributeMismatch {
        node: String,
        declared: ResourceKind,
        actual: ResourceKind,
    },

    #[error("Duplicate logical name: {0}")]
    DuplicateName(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Resource dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGraph {
    nodes: BTreeMap<NodeId, ResourceNode>,
    edges: Vec<Edge>,
    next_id: u32,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with a generated logical name (`<kind><id>`)
    pub fn add_node(&mut self, kind: ResourceKind, attributes: ResourceAttributes) -> NodeId {
        let name = format!("{}{}", kind.as_str(), self.next_id);
        self.add_named_node(name, kind, attributes)
    }

    /// Add a node with an explicit logical name
    pub fn add_named_node(
        &mut self,
        name: impl Into<String>,
        kind: ResourceKind,
        attributes: ResourceAttributes,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            ResourceNode {
                id,
                name: name.into(),
                kind,
                region: None,
                pinned_region: None,
                attributes,
            },
        );
        id
    }

    /// Declare that `from` consumes `to`
    ///
    /// Endpoints are checked by [`validate`](Self::validate), not here.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        let edge = Edge { from, to, kind };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Constrain a node to one region regardless of policy
    pub fn pin_region(&mut self, node: NodeId, region: Region) -> GraphResult<()> {
        let node = self.nodes.get_mut(&node).ok_or(GraphError::UnknownNode(node))?;
        node.pinned_region = Some(region);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look a node up by logical name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    /// First node of a kind (by id)
    pub fn first_of_kind(&self, kind: ResourceKind) -> Option<NodeId> {
        self.nodes.values().find(|n| n.kind == kind).map(|n| n.id)
    }

    /// Logical name for logging; falls back to the id
    pub fn name_of(&self, id: NodeId) -> String {
        self.nodes
            .get(&id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Edges leaving `id`: what it consumes
    pub fn dependencies_of(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Edges entering `id`: who consumes it
    pub fn dependents_of(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Check structural invariants
    ///
    /// # Rules
    /// - Every edge endpoint exists
    /// - Attributes match the declared kind
    /// - Logical names are unique
    /// - No dependency cycles (self-edges included)
    pub fn validate(&self) -> GraphResult<()> {
        for edge in &self.edges {
            for endpoint in [edge.from, edge.to] {
                if !self.nodes.contains_key(&endpoint) {
                    return Err(DanglingReferenceError {
                        from: edge.from,
                        to: edge.to,
                        missing: endpoint,
                    }
                    .into());
                }
            }
        }

        let mut names = HashSet::new();
        for node in self.nodes.values() {
            if node.attributes.kind() != node.kind {
                return Err(GraphError::AttributeMismatch {
                    node: node.name.clone(),
                    declared: node.kind,
                    actual: node.attributes.kind(),
                });
            }
            if !names.insert(node.name.as_str()) {
                return Err(GraphError::DuplicateName(node.name.clone()));
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Dependencies-first order over every edge kind
    ///
    /// Kahn's algorithm; among nodes that are ready at the same time the
    /// lowest id comes first, so the order is deterministic.
    pub fn topological_order(&self) -> GraphResult<Vec<NodeId>> {
        let mut unresolved: BTreeMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        let mut consumers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

        for edge in &self.edges {
            match unresolved.get_mut(&edge.from) {
                Some(count) if self.nodes.contains_key(&edge.to) => *count += 1,
                _ => {
                    return Err(DanglingReferenceError {
                        from: edge.from,
                        to: edge.to,
                        missing: if self.nodes.contains_key(&edge.from) {
                            edge.to
                        } else {
                            edge.from
                        },
                    }
                    .into())
                }
            }
            consumers.entry(edge.to).or_default().push(edge.from);
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = unresolved
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for consumer in consumers.get(&id).into_iter().flatten() {
                if let Some(count) = unresolved.get_mut(consumer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(*consumer));
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let placed: HashSet<NodeId> = order.into_iter().collect();
            let remaining: BTreeSet<NodeId> = self
                .nodes
                .keys()
                .filter(|id| !placed.contains(id))
                .copied()
                .collect();
            return Err(self.find_cycle(&remaining).into());
        }

        Ok(order)
    }

    /// Walk unresolved dependencies until a node repeats
    ///
    /// Every node left over by Kahn's algorithm still has at least one
    /// dependency that is also left over, so the walk always closes.
    fn find_cycle(&self, remaining: &BTreeSet<NodeId>) -> CycleError {
        let mut walk: Vec<NodeId> = Vec::new();
        let mut current = remaining.iter().next().copied();

        while let Some(id) = current {
            if let Some(start) = walk.iter().position(|seen| *seen == id) {
                let mut path: Vec<NodeId> = walk[start..].to_vec();
                path.push(id);
                let names = path.iter().map(|id| self.name_of(*id)).collect();
                return CycleError { path, names };
            }
            walk.push(id);
            current = self
                .dependencies_of(id)
                .map(|e| e.to)
                .filter(|to| remaining.contains(to))
                .min();
        }

        // Unreachable for a graph Kahn rejected; report the leftovers.
        let path: Vec<NodeId> = remaining.iter().copied().collect();
        let names = path.iter().map(|id| self.name_of(*id)).collect();
        CycleError { path, names }
    }

    /// Same nodes, every edge flipped (teardown direction)
    pub fn reversed(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .map(|e| Edge {
                    from: e.to,
                    to: e.from,
                    kind: e.kind,
                })
                .collect(),
            next_id: self.next_id,
        }
    }

    pub(crate) fn assign_region(&mut self, id: NodeId, region: Region) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.region = Some(region);
        }
    }

    pub(crate) fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }
}
