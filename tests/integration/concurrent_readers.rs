#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use walkrank::salsa::{SalsaEngine, SalsaRequest};
use walkrank::storage::{BipartiteGraph, GraphOptions, NeighborCursor, PoolKind, Side};

const LEFTS: u64 = 32;
const PER_LEFT: u64 = 200;

fn edge_type(left: u64, right: u64) -> u8 {
    ((left + right) % 16) as u8
}

fn right_for(left: u64, k: u64) -> u64 {
    left * 10_000 + k
}

fn build(pool: PoolKind) -> Arc<BipartiteGraph> {
    Arc::new(
        BipartiteGraph::new(
            GraphOptions::new()
                .pool(pool)
                .segment_edge_capacity(1500)
                .max_segments(64)
                .max_nodes_per_segment(2048)
                .max_degree(256)
                .initial_node_capacity(4)
                .min_size_class_bits(0),
        )
        .unwrap(),
    )
}

fn write_all(graph: &BipartiteGraph) {
    for k in 0..PER_LEFT {
        for left in 0..LEFTS {
            let right = right_for(left, k);
            graph
                .add_edge(left, right, edge_type(left, right), (k * LEFTS + left) as i64)
                .unwrap();
        }
    }
}

fn readers_never_see_torn_edges(pool: PoolKind) {
    let graph = build(pool);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for reader in 0..4u64 {
            let graph = &graph;
            let done = &done;
            scope.spawn(move || {
                let mut cursor = NeighborCursor::new();
                let mut last_degree = vec![0usize; LEFTS as usize];
                while !done.load(Ordering::Acquire) {
                    for left in (reader..LEFTS).step_by(4) {
                        graph.neighbors_into(left, Side::Left, &mut cursor);
                        let degree = cursor.len();
                        assert!(degree >= last_degree[left as usize]);
                        last_degree[left as usize] = degree;
                        for (k, neighbor) in cursor.as_slice().iter().enumerate() {
                            // Per-left insertion order is k = 0, 1, 2, ...
                            assert_eq!(neighbor.node, right_for(left, k as u64));
                            assert_eq!(neighbor.edge_type, edge_type(left, neighbor.node));
                        }
                        if let Some(last) = cursor.as_slice().last() {
                            // The reverse direction is published second and may lag.
                            let back = graph.neighbors(last.node, Side::Right);
                            assert!(back.len() <= 1);
                            assert!(back.iter().all(|n| n.node == left));
                        }
                    }
                }
            });
        }
        scope.spawn(|| {
            write_all(&graph);
            done.store(true, Ordering::Release);
        });
    });

    for left in 0..LEFTS {
        assert_eq!(graph.degree(left, Side::Left), PER_LEFT as usize);
    }
}

#[test]
fn power_law_readers_never_see_torn_edges() {
    readers_never_see_torn_edges(PoolKind::PowerLaw);
}

#[test]
fn uniform_readers_never_see_torn_edges() {
    readers_never_see_torn_edges(PoolKind::Uniform);
}

#[test]
fn queries_run_while_the_writer_appends() {
    let graph = build(PoolKind::PowerLaw);
    let done = AtomicBool::new(false);
    let engine = SalsaEngine::for_graph(&graph);

    thread::scope(|scope| {
        for query in 0..3u64 {
            let graph = &graph;
            let done = &done;
            let engine = engine.clone();
            scope.spawn(move || {
                let request = SalsaRequest::builder(query)
                    .seed(query + 1, 1.0)
                    .max_random_walk_length(4)
                    .build()
                    .unwrap();
                while !done.load(Ordering::Acquire) {
                    let snapshot = graph.snapshot();
                    let first = engine.recommend(&snapshot, &request).unwrap();
                    let second = engine.recommend(&snapshot, &request).unwrap();
                    assert!(first.len() <= 10);
                    // Only the writable segment can grow under a held snapshot,
                    // so results need not match, but they must stay well formed.
                    for result in first.iter().chain(second.iter()) {
                        assert!(result.score.is_finite() && result.score > 0.0);
                    }
                }
            });
        }
        scope.spawn(|| {
            write_all(&graph);
            done.store(true, Ordering::Release);
        });
    });
}

#[test]
fn held_snapshot_outlives_eviction() {
    let graph = BipartiteGraph::new(
        GraphOptions::new()
            .segment_edge_capacity(10)
            .max_segments(2)
            .max_nodes_per_segment(64)
            .max_degree(32),
    )
    .unwrap();
    for right in 0..10u64 {
        graph.add_edge(1, right, 0, 0).unwrap();
    }
    let held = graph.snapshot();
    for right in 10..40u64 {
        graph.add_edge(1, right, 0, 0).unwrap();
    }

    let old: Vec<u64> = held.neighbors(1, Side::Left).iter().map(|n| n.node).collect();
    assert_eq!(old, (0..10).collect::<Vec<_>>());
    let current: Vec<u64> = graph.neighbors(1, Side::Left).iter().map(|n| n.node).collect();
    assert_eq!(current, (20..40).collect::<Vec<_>>());
}
