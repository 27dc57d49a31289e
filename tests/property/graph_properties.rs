// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph validation and ordering properties

use super::{attributes, build_dag, graph_shape};
use cim_static_distribution::domain::ResourceKind;
use cim_static_distribution::graph::GraphError;
use cim_static_distribution::{EdgeKind, NodeId, ResourceGraph};
use proptest::prelude::*;
use std::collections::HashMap;

proptest! {
    /// An acyclic graph validates and its order puts dependencies first
    #[test]
    fn prop_dag_orders_dependencies_first((kinds, pairs) in graph_shape()) {
        let (graph, _) = build_dag(&kinds, &pairs);
        prop_assert!(graph.validate().is_ok());

        let order = graph.topological_order().unwrap();
        prop_assert_eq!(order.len(), kinds.len());

        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for edge in graph.edges() {
            prop_assert!(position[&edge.to] < position[&edge.from]);
        }
    }

    /// Ordering is a pure function of the graph
    #[test]
    fn prop_order_is_deterministic((kinds, pairs) in graph_shape()) {
        let (graph, _) = build_dag(&kinds, &pairs);
        prop_assert_eq!(graph.topological_order().unwrap(), graph.clone().topological_order().unwrap());
    }

    /// Closing a chain back onto its head is always a cycle; the path
    /// repeats its first node at the end
    #[test]
    fn prop_closed_chain_is_cycle(len in 1usize..8) {
        let mut graph = ResourceGraph::new();
        let ids: Vec<NodeId> = (0..len)
            .map(|_| graph.add_node(ResourceKind::Bucket, attributes(ResourceKind::Bucket)))
            .collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[1], pair[0], EdgeKind::DependsOn);
        }
        graph.add_edge(ids[0], ids[len - 1], EdgeKind::DependsOn);

        match graph.validate() {
            Err(GraphError::Cycle(cycle)) => prop_assert_eq!(cycle.path.len(), len + 1),
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }

    /// An edge to an id that was never allocated is rejected
    #[test]
    fn prop_missing_endpoint_is_dangling((kinds, pairs) in graph_shape(), from in 0usize..12) {
        let (mut graph, ids) = build_dag(&kinds, &pairs);
        let missing = NodeId::new(kinds.len() as u32 + 100);
        let consumer = ids[from % ids.len()];
        graph.add_edge(consumer, missing, EdgeKind::DependsOn);

        match graph.validate() {
            Err(GraphError::DanglingReference(err)) => prop_assert_eq!(err.missing, missing),
            other => prop_assert!(false, "expected dangling reference, got {:?}", other),
        }
    }

    /// Reversal flips every edge and keeps every node
    #[test]
    fn prop_reversed_flips_edges((kinds, pairs) in graph_shape()) {
        let (graph, _) = build_dag(&kinds, &pairs);
        let reversed = graph.reversed();

        prop_assert_eq!(reversed.len(), graph.len());
        prop_assert_eq!(reversed.edges().len(), graph.edges().len());
        for (original, flipped) in graph.edges().iter().zip(reversed.edges()) {
            prop_assert_eq!(original.from, flipped.to);
            prop_assert_eq!(original.to, flipped.from);
            prop_assert_eq!(original.kind, flipped.kind);
        }
        prop_assert_eq!(reversed.reversed(), graph);
    }
}
