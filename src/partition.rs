// Copyright (c) 2025 - Cowboy AI, Inc.
//! Region Partitioner
//!
//! Assigns every node of a validated [`ResourceGraph`] to a region and
//! splits the graph into per-region [`StackPartition`]s. Dependencies that
//! end up spanning two regions are re-typed as
//! [`EdgeKind::CrossRegionReference`] so the orchestrator can hand their
//! outputs across the region boundary explicitly. A validation gate that
//! crosses regions stays a gate and gains a companion cross-region edge.
//!
//! # Placement Rules
//!
//! 1. A node's own pin and its kind's policy pin must agree
//! 2. Pinned nodes take their pinned region
//! 3. A co-located node follows its primary consumer: the lowest-id
//!    dependent with a resolved region, pinned dependents first
//! 4. Without a resolved consumer it follows its first resolved dependency
//! 5. Otherwise it lands in the policy's home region

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::{Region, ResourceKind};
use crate::graph::{Edge, EdgeKind, GraphError, NodeId, ResourceGraph};

/// Where nodes of one kind are placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Pinned(Region),
    CoLocated,
}

/// Placement policy: kind → placement, plus a fallback region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPolicy {
    home_region: Region,
    placements: BTreeMap<ResourceKind, Placement>,
    conflicts: Vec<UnsatisfiableConstraintError>,
}

impl RegionPolicy {
    /// Empty policy: every kind co-located, falling back to `home_region`
    pub fn new(home_region: Region) -> Self {
        Self {
            home_region,
            placements: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Pin a kind to a region
    ///
    /// Pinning a kind a second time to a different region is recorded and
    /// reported when partitioning.
    pub fn pin(mut self, kind: ResourceKind, region: Region) -> Self {
        if let Some(Placement::Pinned(existing)) = self.placements.get(&kind) {
            if *existing != region {
                self.conflicts.push(UnsatisfiableConstraintError {
                    subject: kind.as_str().to_string(),
                    first: existing.clone(),
                    second: region,
                });
                return self;
            }
        }
        self.placements.insert(kind, Placement::Pinned(region));
        self
    }

    pub fn co_locate(mut self, kind: ResourceKind) -> Self {
        self.placements.insert(kind, Placement::CoLocated);
        self
    }

    /// Placement for a kind (co-located unless pinned)
    pub fn placement(&self, kind: ResourceKind) -> Placement {
        self.placements
            .get(&kind)
            .cloned()
            .unwrap_or(Placement::CoLocated)
    }

    pub fn home_region(&self) -> &Region {
        &self.home_region
    }

    /// Every region the policy names
    pub fn regions(&self) -> BTreeSet<Region> {
        let mut regions: BTreeSet<Region> = self
            .placements
            .values()
            .filter_map(|p| match p {
                Placement::Pinned(region) => Some(region.clone()),
                Placement::CoLocated => None,
            })
            .collect();
        regions.insert(self.home_region.clone());
        regions
    }
}

/// A node cannot be placed in a single region
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot place {subject} in both {first} and {second}")]
pub struct UnsatisfiableConstraintError {
    /// Kind or logical node name the constraints apply to
    pub subject: String,
    pub first: Region,
    pub second: Region,
}

/// Partitioning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    UnsatisfiableConstraint(#[from] UnsatisfiableConstraintError),
}

/// Nodes sharing a region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackPartition {
    pub region: Region,
    pub nodes: Vec<NodeId>,
}

/// Graph with regions assigned and cross-region edges made explicit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedGraph {
    graph: ResourceGraph,
    partitions: Vec<StackPartition>,
}

impl PartitionedGraph {
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Partitions ordered by region
    pub fn partitions(&self) -> &[StackPartition] {
        &self.partitions
    }

    pub fn region_of(&self, id: NodeId) -> Option<&Region> {
        self.graph.node(id).and_then(|n| n.region.as_ref())
    }

    pub fn partition(&self, region: &Region) -> Option<&StackPartition> {
        self.partitions.iter().find(|p| p.region == *region)
    }

    pub fn cross_region_edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::CrossRegionReference)
    }
}

/// Assign regions and split the graph
pub fn partition(
    graph: &ResourceGraph,
    policy: &RegionPolicy,
) -> Result<PartitionedGraph, PartitionError> {
    graph.validate()?;

    if let Some(conflict) = policy.conflicts.first() {
        return Err(conflict.clone().into());
    }

    let order = graph.topological_order()?;
    let mut assigned: BTreeMap<NodeId, Region> = BTreeMap::new();
    let mut pinned: BTreeSet<NodeId> = BTreeSet::new();

    for node in graph.nodes() {
        let kind_pin = match policy.placement(node.kind) {
            Placement::Pinned(region) => Some(region),
            Placement::CoLocated => None,
        };
        let region = match (&node.pinned_region, kind_pin) {
            (Some(own), Some(kind)) if *own != kind => {
                return Err(UnsatisfiableConstraintError {
                    subject: node.name.clone(),
                    first: kind,
                    second: own.clone(),
                }
                .into());
            }
            (Some(own), _) => Some(own.clone()),
            (None, kind) => kind,
        };
        if let Some(region) = region {
            assigned.insert(node.id, region);
            pinned.insert(node.id);
        }
    }

    // Consumers before dependencies, so a co-located chain follows the
    // pinned node at its end.
    for id in order.iter().rev() {
        if assigned.contains_key(id) {
            continue;
        }
        let consumers: BTreeSet<NodeId> = graph.dependents_of(*id).map(|e| e.from).collect();
        let primary = consumers
            .iter()
            .find(|c| pinned.contains(*c))
            .or_else(|| consumers.iter().find(|c| assigned.contains_key(*c)));
        if let Some(region) = primary.and_then(|c| assigned.get(c)).cloned() {
            assigned.insert(*id, region);
        }
    }

    for id in &order {
        if assigned.contains_key(id) {
            continue;
        }
        let region = graph
            .dependencies_of(*id)
            .map(|e| e.to)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .find_map(|dep| assigned.get(&dep).cloned())
            .unwrap_or_else(|| policy.home_region().clone());
        assigned.insert(*id, region);
    }

    let mut annotated = graph.clone();
    let mut by_region: BTreeMap<Region, Vec<NodeId>> = BTreeMap::new();
    for (id, region) in &assigned {
        annotated.assign_region(*id, region.clone());
        by_region.entry(region.clone()).or_default().push(*id);
    }

    let mut edges: Vec<Edge> = Vec::with_capacity(graph.edges().len());
    for edge in graph.edges() {
        let crosses = assigned.get(&edge.from) != assigned.get(&edge.to);
        let kind = match edge.kind {
            EdgeKind::DependsOn if crosses => EdgeKind::CrossRegionReference,
            EdgeKind::CrossRegionReference if !crosses => EdgeKind::DependsOn,
            other => other,
        };
        if kind != edge.kind {
            debug!(
                from = %graph.name_of(edge.from),
                to = %graph.name_of(edge.to),
                %kind,
                "Re-typed edge after placement"
            );
        }
        push_unique(&mut edges, Edge { kind, ..*edge });

        // A gate keeps its kind; the region hop gets its own edge
        if edge.kind == EdgeKind::ValidationGate && crosses {
            debug!(
                from = %graph.name_of(edge.from),
                to = %graph.name_of(edge.to),
                "Validation gate crosses regions"
            );
            push_unique(
                &mut edges,
                Edge {
                    kind: EdgeKind::CrossRegionReference,
                    ..*edge
                },
            );
        }
    }
    annotated.replace_edges(edges);

    let partitions = by_region
        .into_iter()
        .map(|(region, nodes)| StackPartition { region, nodes })
        .collect();

    Ok(PartitionedGraph {
        graph: annotated,
        partitions,
    })
}

fn push_unique(edges: &mut Vec<Edge>, edge: Edge) {
    if !edges.contains(&edge) {
        edges.push(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainName;
    use crate::graph::{
        BucketAttributes, DnsRecordAttributes, HostedZoneAttributes, RecordTarget, RecordType,
        RemovalPolicy, ResourceAttributes,
    };
    use pretty_assertions::assert_eq;

    fn region(s: &str) -> Region {
        Region::new(s).unwrap()
    }

    fn bucket() -> ResourceAttributes {
        ResourceAttributes::Bucket(BucketAttributes {
            name_prefix: "docs".to_string(),
            block_public_access: true,
            removal_policy: RemovalPolicy::Destroy,
        })
    }

    fn zone() -> ResourceAttributes {
        ResourceAttributes::HostedZone(HostedZoneAttributes {
            zone_name: DomainName::new("docs.example.com").unwrap(),
        })
    }

    fn record() -> ResourceAttributes {
        ResourceAttributes::DnsRecord(DnsRecordAttributes {
            record_name: None,
            record_type: RecordType::A,
            target: RecordTarget::Distribution,
        })
    }

    #[test]
    fn test_dependency_across_regions_is_retyped() {
        let mut graph = ResourceGraph::new();
        let b = graph.add_node(ResourceKind::Bucket, bucket());
        let r = graph.add_node(ResourceKind::DnsRecord, record());
        graph.add_edge(r, b, EdgeKind::DependsOn);

        let policy = RegionPolicy::new(region("eu-west-1"))
            .pin(ResourceKind::Bucket, region("eu-west-1"))
            .pin(ResourceKind::DnsRecord, region("us-east-1"));
        let partitioned = partition(&graph, &policy).unwrap();

        assert_eq!(partitioned.partitions().len(), 2);
        assert_eq!(partitioned.cross_region_edges().count(), 1);
        assert_eq!(partitioned.region_of(b), Some(&region("eu-west-1")));
        assert_eq!(partitioned.region_of(r), Some(&region("us-east-1")));
    }

    #[test]
    fn test_crossing_validation_gate_gains_cross_region_edge() {
        let mut graph = ResourceGraph::new();
        let b = graph.add_node(ResourceKind::Bucket, bucket());
        let r = graph.add_node(ResourceKind::DnsRecord, record());
        graph.add_edge(r, b, EdgeKind::ValidationGate);

        let policy = RegionPolicy::new(region("eu-west-1"))
            .pin(ResourceKind::Bucket, region("eu-west-1"))
            .pin(ResourceKind::DnsRecord, region("us-east-1"));
        let partitioned = partition(&graph, &policy).unwrap();

        let kinds: Vec<EdgeKind> = partitioned.graph().edges().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::ValidationGate, EdgeKind::CrossRegionReference]
        );
        let crossing: Vec<&Edge> = partitioned.cross_region_edges().collect();
        assert_eq!(crossing.len(), 1);
        assert_eq!((crossing[0].from, crossing[0].to), (r, b));
    }

    #[test]
    fn test_gate_within_region_stays_single() {
        let mut graph = ResourceGraph::new();
        let z = graph.add_node(ResourceKind::HostedZone, zone());
        let r = graph.add_node(ResourceKind::DnsRecord, record());
        graph.add_edge(r, z, EdgeKind::ValidationGate);

        let policy = RegionPolicy::new(region("us-east-1"));
        let partitioned = partition(&graph, &policy).unwrap();
        assert_eq!(partitioned.graph().edges().len(), 1);
        assert_eq!(partitioned.cross_region_edges().count(), 0);
    }

    #[test]
    fn test_co_located_follows_pinned_consumer() {
        let mut graph = ResourceGraph::new();
        let z = graph.add_node(ResourceKind::HostedZone, zone());
        let r = graph.add_node(ResourceKind::DnsRecord, record());
        graph.add_edge(r, z, EdgeKind::DependsOn);

        let policy = RegionPolicy::new(region("eu-west-1"))
            .pin(ResourceKind::DnsRecord, region("us-east-1"))
            .co_locate(ResourceKind::HostedZone);
        let partitioned = partition(&graph, &policy).unwrap();

        assert_eq!(partitioned.region_of(z), Some(&region("us-east-1")));
        assert_eq!(partitioned.cross_region_edges().count(), 0);
        assert_eq!(partitioned.partitions().len(), 1);
    }

    #[test]
    fn test_orphan_falls_back_to_home() {
        let mut graph = ResourceGraph::new();
        let z = graph.add_node(ResourceKind::HostedZone, zone());

        let policy = RegionPolicy::new(region("eu-central-1"));
        let partitioned = partition(&graph, &policy).unwrap();
        assert_eq!(partitioned.region_of(z), Some(&region("eu-central-1")));
    }

    #[test]
    fn test_declared_cross_region_edge_normalised() {
        let mut graph = ResourceGraph::new();
        let z = graph.add_node(ResourceKind::HostedZone, zone());
        let r = graph.add_node(ResourceKind::DnsRecord, record());
        graph.add_edge(r, z, EdgeKind::CrossRegionReference);

        let policy = RegionPolicy::new(region("us-east-1"));
        let partitioned = partition(&graph, &policy).unwrap();
        assert_eq!(partitioned.graph().edges()[0].kind, EdgeKind::DependsOn);
    }

    #[test]
    fn test_conflicting_kind_pins() {
        let graph = ResourceGraph::new();
        let policy = RegionPolicy::new(region("eu-west-1"))
            .pin(ResourceKind::Certificate, region("us-east-1"))
            .pin(ResourceKind::Certificate, region("eu-west-1"));

        assert!(matches!(
            partition(&graph, &policy),
            Err(PartitionError::UnsatisfiableConstraint(_))
        ));
    }

    #[test]
    fn test_node_pin_conflicts_with_kind_pin() {
        let mut graph = ResourceGraph::new();
        let b = graph.add_named_node("assets", ResourceKind::Bucket, bucket());
        graph.pin_region(b, region("ap-south-1")).unwrap();

        let policy =
            RegionPolicy::new(region("eu-west-1")).pin(ResourceKind::Bucket, region("eu-west-1"));
        match partition(&graph, &policy) {
            Err(PartitionError::UnsatisfiableConstraint(e)) => assert_eq!(e.subject, "assets"),
            other => panic!("expected constraint error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_graph_rejected() {
        let mut graph = ResourceGraph::new();
        let z = graph.add_node(ResourceKind::HostedZone, zone());
        graph.add_edge(z, z, EdgeKind::DependsOn);

        let policy = RegionPolicy::new(region("eu-west-1"));
        assert!(matches!(
            partition(&graph, &policy),
            Err(PartitionError::Graph(GraphError::Cycle(_)))
        ));
    }

    #[test]
    fn test_policy_regions() {
        let policy = RegionPolicy::new(region("eu-west-1"))
            .pin(ResourceKind::Certificate, region("us-east-1"));
        assert_eq!(policy.regions().len(), 2);
        assert_eq!(policy.placement(ResourceKind::Bucket), Placement::CoLocated);
    }
}
