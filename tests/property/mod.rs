// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Random dependency graphs are built from a small set of resource kinds
//! whose attributes need no external inputs.

mod graph_properties;
mod partition_properties;

use cim_static_distribution::domain::{DomainName, ResourceKind};
use cim_static_distribution::graph::{
    BucketAttributes, DnsRecordAttributes, HostedZoneAttributes, RecordTarget, RecordType,
    RemovalPolicy, ResourceAttributes,
};
use cim_static_distribution::{EdgeKind, NodeId, ResourceGraph};
use proptest::prelude::*;

pub const KINDS: [ResourceKind; 3] = [
    ResourceKind::Bucket,
    ResourceKind::HostedZone,
    ResourceKind::DnsRecord,
];

pub fn attributes(kind: ResourceKind) -> ResourceAttributes {
    match kind {
        ResourceKind::HostedZone => ResourceAttributes::HostedZone(HostedZoneAttributes {
            zone_name: DomainName::new("docs.example.com").unwrap(),
        }),
        ResourceKind::DnsRecord => ResourceAttributes::DnsRecord(DnsRecordAttributes {
            record_name: None,
            record_type: RecordType::A,
            target: RecordTarget::Distribution,
        }),
        _ => ResourceAttributes::Bucket(BucketAttributes {
            name_prefix: "docs".to_string(),
            block_public_access: true,
            removal_policy: RemovalPolicy::Destroy,
        }),
    }
}

/// Node kinds plus edge candidates `(consumer, dependency)` as raw indices
pub fn graph_shape() -> impl Strategy<Value = (Vec<ResourceKind>, Vec<(usize, usize)>)> {
    prop::collection::vec(prop::sample::select(KINDS.to_vec()), 2..12).prop_flat_map(|kinds| {
        let n = kinds.len();
        (
            Just(kinds),
            prop::collection::vec((0..n, 0..n), 0..n * 2),
        )
    })
}

/// Build an acyclic graph: every edge points from a higher id to a lower id
pub fn build_dag(kinds: &[ResourceKind], pairs: &[(usize, usize)]) -> (ResourceGraph, Vec<NodeId>) {
    let mut graph = ResourceGraph::new();
    let ids: Vec<NodeId> = kinds
        .iter()
        .map(|kind| graph.add_node(*kind, attributes(*kind)))
        .collect();
    for (a, b) in pairs {
        if a != b {
            let (consumer, dependency) = if a > b { (a, b) } else { (b, a) };
            graph.add_edge(ids[*consumer], ids[*dependency], EdgeKind::DependsOn);
        }
    }
    (graph, ids)
}
