#![allow(missing_docs)]

use std::sync::atomic::Ordering;
use std::sync::Arc;

use walkrank::storage::{
    BipartiteGraph, CounterMetrics, GraphOptions, NeighborCursor, PoolKind, Side,
};
use walkrank::GraphError;

fn options(capacity: usize, window: usize) -> GraphOptions {
    GraphOptions::new()
        .segment_edge_capacity(capacity)
        .max_segments(window)
        .max_nodes_per_segment(256)
        .max_degree(64)
}

fn right_ids(graph: &BipartiteGraph, left: u64) -> Vec<u64> {
    graph
        .neighbors(left, Side::Left)
        .into_iter()
        .map(|n| n.node)
        .collect()
}

#[test]
fn window_slides_as_segments_seal() {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = BipartiteGraph::new(options(4, 2).metrics(metrics.clone())).unwrap();
    for right in 0..12u64 {
        graph.add_edge(1, right, 0, right as i64).unwrap();
    }
    // 12 edges in segments of 4: three sealed, the oldest evicted.
    assert_eq!(right_ids(&graph, 1), (4..12).collect::<Vec<_>>());
    let stats = graph.stats();
    assert_eq!(stats.segments, 2);
    assert_eq!(stats.edges, 8);
    assert_eq!(stats.time_range, Some((4, 11)));
    assert_eq!(metrics.segments_sealed.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.segments_evicted.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.edges_added.load(Ordering::Relaxed), 12);
}

#[test]
fn both_sides_see_every_edge() {
    let graph = BipartiteGraph::new(options(3, 8)).unwrap();
    let edges = [(1, 10), (2, 10), (1, 11), (3, 12), (2, 11), (1, 12), (3, 10)];
    for (i, &(left, right)) in edges.iter().enumerate() {
        graph.add_edge(left, right, (i % 3) as u8, i as i64).unwrap();
    }
    for &(left, right) in &edges {
        assert!(right_ids(&graph, left).contains(&right));
        let lefts: Vec<u64> = graph
            .neighbors(right, Side::Right)
            .into_iter()
            .map(|n| n.node)
            .collect();
        assert!(lefts.contains(&left));
    }
    assert_eq!(graph.degree(10, Side::Right), 3);
    assert_eq!(graph.degree(1, Side::Left), 3);
}

#[test]
fn edge_types_survive_segment_boundaries() {
    let graph = BipartiteGraph::new(options(2, 4).edge_type_bits(3)).unwrap();
    for ty in 0..7u8 {
        graph.add_edge(5, 100 + u64::from(ty), ty, 0).unwrap();
    }
    let types: Vec<u8> = graph
        .neighbors(5, Side::Left)
        .into_iter()
        .map(|n| n.edge_type)
        .collect();
    assert_eq!(types, (0..7).collect::<Vec<_>>());
}

#[test]
fn out_of_range_type_is_rejected_without_side_effects() {
    let metrics = Arc::new(CounterMetrics::default());
    let graph =
        BipartiteGraph::new(options(8, 2).edge_type_bits(2).metrics(metrics.clone())).unwrap();
    graph.add_edge(1, 2, 3, 0).unwrap();
    let err = graph.add_edge(1, 3, 4, 0).unwrap_err();
    assert!(matches!(err, GraphError::EncodingRange { .. }));
    assert_eq!(right_ids(&graph, 1), vec![2]);
    assert!(graph.neighbors(3, Side::Right).is_empty());
    assert_eq!(metrics.edges_rejected.load(Ordering::Relaxed), 1);
}

#[test]
fn degree_bound_is_enforced_per_segment() {
    let graph = BipartiteGraph::new(
        GraphOptions::new()
            .segment_edge_capacity(100)
            .max_nodes_per_segment(16)
            .max_degree(2),
    )
    .unwrap();
    graph.add_edge(1, 1, 0, 0).unwrap();
    graph.add_edge(1, 2, 0, 0).unwrap();
    let err = graph.add_edge(1, 3, 0, 0).unwrap_err();
    assert!(err.is_capacity());
    // A fresh segment accepts the node again.
    assert!(graph.seal_current());
    graph.add_edge(1, 3, 0, 0).unwrap();
    assert_eq!(graph.degree(1, Side::Left), 3);
}

#[test]
fn node_bound_is_enforced_per_segment() {
    let graph = BipartiteGraph::new(
        GraphOptions::new()
            .segment_edge_capacity(100)
            .max_nodes_per_segment(2)
            .max_degree(8),
    )
    .unwrap();
    graph.add_edge(1, 10, 0, 0).unwrap();
    graph.add_edge(2, 10, 0, 0).unwrap();
    assert!(graph.add_edge(3, 10, 0, 0).unwrap_err().is_capacity());
    // Known nodes keep working.
    graph.add_edge(2, 11, 0, 0).unwrap();
}

#[test]
fn uniform_and_power_law_pools_agree() {
    let uniform = BipartiteGraph::new(options(50, 4).pool(PoolKind::Uniform)).unwrap();
    let power_law = BipartiteGraph::new(options(50, 4).pool(PoolKind::PowerLaw)).unwrap();
    for i in 0..180u64 {
        let left = (i * 7) % 13;
        let right = (i * 11) % 17;
        uniform.add_edge(left, right, (i % 4) as u8, i as i64).unwrap();
        power_law.add_edge(left, right, (i % 4) as u8, i as i64).unwrap();
    }
    for node in 0..17 {
        assert_eq!(
            uniform.neighbors(node, Side::Left),
            power_law.neighbors(node, Side::Left)
        );
        assert_eq!(
            uniform.neighbors(node, Side::Right),
            power_law.neighbors(node, Side::Right)
        );
    }
    assert!(power_law.stats().pools.reserved_entries < uniform.stats().pools.reserved_entries);
}

#[test]
fn optimization_reclaims_slack_and_keeps_order() {
    let metrics = Arc::new(CounterMetrics::default());
    let graph = BipartiteGraph::new(options(64, 4).metrics(metrics.clone())).unwrap();
    for i in 0..200u64 {
        graph.add_edge(i % 5, 1000 + (i * 3) % 41, 0, i as i64).unwrap();
    }
    graph.seal_current();
    let before: Vec<_> = (0..5).map(|n| graph.neighbors(n, Side::Left)).collect();
    let rebuilt = graph.optimize_sealed().unwrap();
    assert!(rebuilt > 0);
    let after: Vec<_> = (0..5).map(|n| graph.neighbors(n, Side::Left)).collect();
    assert_eq!(before, after);
    assert_eq!(graph.stats().pools.wasted_entries(), 0);
    assert!(metrics.optimizer_reclaimed_entries.load(Ordering::Relaxed) > 0);
}

#[test]
fn cursor_is_reusable_across_lookups() {
    let graph = BipartiteGraph::new(options(16, 2)).unwrap();
    graph.add_edge(1, 10, 0, 0).unwrap();
    graph.add_edge(1, 11, 0, 0).unwrap();
    graph.add_edge(2, 12, 0, 0).unwrap();

    let mut cursor = NeighborCursor::with_capacity(8);
    graph.neighbors_into(1, Side::Left, &mut cursor);
    assert_eq!(cursor.len(), 2);
    let first: Vec<u64> = cursor.by_ref().map(|n| n.node).collect();
    cursor.restart();
    let again: Vec<u64> = cursor.by_ref().map(|n| n.node).collect();
    assert_eq!(first, again);

    graph.neighbors_into(2, Side::Left, &mut cursor);
    assert_eq!(cursor.as_slice().len(), 1);
    assert_eq!(cursor.get(0).map(|n| n.node), Some(12));

    graph.neighbors_into(99, Side::Left, &mut cursor);
    assert!(cursor.is_empty());
}

#[test]
fn invalid_options_are_rejected() {
    assert!(matches!(
        BipartiteGraph::new(GraphOptions::new().max_segments(0)),
        Err(GraphError::Configuration(_))
    ));
    assert!(matches!(
        BipartiteGraph::new(GraphOptions::new().edge_type_bits(9)),
        Err(GraphError::Configuration(_))
    ));
}
