// Copyright (c) 2025 - Cowboy AI, Inc.
//! Region placement properties

use super::{build_dag, graph_shape};
use cim_static_distribution::domain::{Region, ResourceKind};
use cim_static_distribution::{partition, EdgeKind, RegionPolicy};
use proptest::prelude::*;

fn region(name: &str) -> Region {
    Region::new(name).unwrap()
}

fn policy() -> RegionPolicy {
    RegionPolicy::new(region("eu-west-1"))
        .pin(ResourceKind::Bucket, region("eu-west-1"))
        .pin(ResourceKind::DnsRecord, region("us-east-1"))
        .co_locate(ResourceKind::HostedZone)
}

proptest! {
    /// Every node is placed, pinned kinds in their pinned region
    #[test]
    fn prop_pinned_kinds_land_in_their_region((kinds, pairs) in graph_shape()) {
        let (graph, _) = build_dag(&kinds, &pairs);
        let partitioned = partition(&graph, &policy()).unwrap();

        for node in partitioned.graph().nodes() {
            let placed = partitioned.region_of(node.id);
            prop_assert!(placed.is_some());
            match node.kind {
                ResourceKind::Bucket => prop_assert_eq!(placed.cloned(), Some(region("eu-west-1"))),
                ResourceKind::DnsRecord => prop_assert_eq!(placed.cloned(), Some(region("us-east-1"))),
                _ => {}
            }
        }

        let placed: usize = partitioned.partitions().iter().map(|p| p.nodes.len()).sum();
        prop_assert_eq!(placed, kinds.len());
    }

    /// Dependencies are cross-region exactly when their endpoints differ
    #[test]
    fn prop_cross_region_edges_match_placement((kinds, pairs) in graph_shape()) {
        let (graph, _) = build_dag(&kinds, &pairs);
        let partitioned = partition(&graph, &policy()).unwrap();

        for edge in partitioned.graph().edges() {
            let crosses = partitioned.region_of(edge.from) != partitioned.region_of(edge.to);
            let expected = if crosses {
                EdgeKind::CrossRegionReference
            } else {
                EdgeKind::DependsOn
            };
            prop_assert_eq!(edge.kind, expected);
        }
    }

    /// A validation gate keeps its kind wherever its endpoints land, and
    /// gains a cross-region edge exactly when it crosses regions
    #[test]
    fn prop_validation_gates_survive_placement((kinds, pairs) in graph_shape()) {
        let (mut graph, ids) = build_dag(&kinds, &pairs);
        let (consumer, dependency) = (ids[ids.len() - 1], ids[0]);
        graph.add_edge(consumer, dependency, EdgeKind::ValidationGate);
        let partitioned = partition(&graph, &policy()).unwrap();

        let between = |kind: EdgeKind| {
            partitioned
                .graph()
                .edges()
                .iter()
                .filter(|e| e.from == consumer && e.to == dependency && e.kind == kind)
                .count()
        };
        prop_assert_eq!(between(EdgeKind::ValidationGate), 1);

        let crosses = partitioned.region_of(consumer) != partitioned.region_of(dependency);
        prop_assert_eq!(between(EdgeKind::CrossRegionReference), usize::from(crosses));
    }

    /// Every crossing edge is listed by the partitioned graph
    #[test]
    fn prop_cross_region_listing_covers_every_crossing((kinds, pairs) in graph_shape()) {
        let (mut graph, ids) = build_dag(&kinds, &pairs);
        graph.add_edge(ids[ids.len() - 1], ids[0], EdgeKind::ValidationGate);
        let partitioned = partition(&graph, &policy()).unwrap();

        for edge in partitioned.graph().edges() {
            if partitioned.region_of(edge.from) != partitioned.region_of(edge.to) {
                prop_assert!(partitioned
                    .cross_region_edges()
                    .any(|c| c.from == edge.from && c.to == edge.to));
            }
        }
    }
}
