#![allow(missing_docs)]

use walkrank::salsa::{
    FilterChain, RecommendationResult, SalsaEngine, SalsaRequest, SalsaRequestBuilder,
    ScoreNormalization, SocialProof, WalkMode,
};
use walkrank::storage::{BipartiteGraph, GraphOptions};

fn graph_with(edges: &[(u64, u64, u8, i64)], capacity: usize) -> BipartiteGraph {
    let graph = BipartiteGraph::new(
        GraphOptions::new()
            .segment_edge_capacity(capacity)
            .max_segments(64)
            .max_nodes_per_segment(4096)
            .max_degree(256),
    )
    .unwrap();
    for &(left, right, ty, ts) in edges {
        graph.add_edge(left, right, ty, ts).unwrap();
    }
    graph
}

fn graph(edges: &[(u64, u64)]) -> BipartiteGraph {
    let typed: Vec<_> = edges.iter().map(|&(l, r)| (l, r, 0, 0)).collect();
    graph_with(&typed, 1 << 16)
}

fn run(graph: &BipartiteGraph, builder: SalsaRequestBuilder) -> Vec<RecommendationResult> {
    let request = builder.build().unwrap();
    SalsaEngine::default()
        .recommend(&graph.snapshot(), &request)
        .unwrap()
}

fn ids(results: &[RecommendationResult]) -> Vec<u64> {
    results.iter().map(|r| r.node).collect()
}

/// Eight left nodes, twenty right nodes, skewed degrees.
fn community_graph() -> BipartiteGraph {
    let mut edges = Vec::new();
    for left in 1..=8u64 {
        for k in 0..(left + 2) {
            edges.push((left, 100 + (left * 3 + k * 5) % 20));
        }
    }
    graph(&edges)
}

#[test]
fn single_seed_star_scores_neighbors_equally() {
    let graph = graph(&[(1, 101), (1, 102), (1, 103)]);
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .seed(1, 1.0)
            .reset_probability(0.3)
            .max_random_walk_length(1)
            .num_random_walks(1)
            .max_num_results(10),
    );

    assert_eq!(ids(&results), vec![101, 102, 103]);
    let score = results[0].score;
    assert!(score > 0.0);
    let mut expected_proof = SocialProof::new();
    expected_proof.insert(0, vec![1]);
    for result in &results {
        assert_eq!(result.score, score);
        assert_eq!(result.social_proof, expected_proof);
    }
}

fn chain_graph() -> BipartiteGraph {
    // L1 - R1, R2; L2 - R2, R3; L3 - R3, R4
    graph(&[(1, 11), (1, 12), (2, 12), (2, 13), (3, 13), (3, 14)])
}

#[test]
fn full_reset_keeps_results_at_direct_neighbors() {
    let graph = chain_graph();
    for mode in [WalkMode::Expected, WalkMode::Sampled { seed: 3 }] {
        let results = run(
            &graph,
            SalsaRequest::builder(1)
                .reset_probability(1.0)
                .num_random_walks(200)
                .walk_mode(mode)
                .max_random_walk_length(9),
        );
        let mut found = ids(&results);
        found.sort_unstable();
        assert_eq!(found, vec![11, 12], "mode {mode:?}");
    }
}

#[test]
fn no_reset_walks_past_the_neighborhood() {
    let graph = chain_graph();
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .reset_probability(0.0)
            .max_random_walk_length(3),
    );
    assert_eq!(ids(&results), vec![12, 11, 13]);
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[1].score, 0.875);
    assert_eq!(results[2].score, 0.125);
    // Mass reaching R3 came through L2, which is not a seed.
    assert!(results[2].social_proof.is_empty());
}

#[test]
fn runs_are_reproducible() {
    let graph = community_graph();
    for mode in [WalkMode::Expected, WalkMode::Sampled { seed: 42 }] {
        let builder = || {
            SalsaRequest::builder(2)
                .seeds([(3, 1.0), (5, 0.5)])
                .num_random_walks(500)
                .walk_mode(mode)
                .max_random_walk_length(6)
                .max_num_results(8)
        };
        let first = run(&graph, builder());
        let second = run(&graph, builder());
        assert!(!first.is_empty());
        assert_eq!(first, second, "mode {mode:?}");
    }
}

#[test]
fn sampled_walkers_are_counted_once_per_right_step() {
    let graph = graph(&[(1, 10), (1, 11), (1, 12)]);
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .num_random_walks(300)
            .walk_mode(WalkMode::Sampled { seed: 9 })
            .max_random_walk_length(1),
    );
    let total: f64 = results.iter().map(|r| r.score).sum();
    assert_eq!(total, 300.0);
    assert_eq!(results.len(), 3);
}

#[test]
fn excluded_nodes_never_appear() {
    let graph = chain_graph();
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .exclude([12])
            .reset_probability(0.0)
            .max_random_walk_length(3),
    );
    assert_eq!(ids(&results), vec![11, 13]);
}

#[test]
fn filter_chain_uses_and_semantics() {
    let graph = community_graph();
    let base = || SalsaRequest::builder(4).max_random_walk_length(4).max_num_results(50);

    let unfiltered = run(&graph, base().filters(FilterChain::new()));
    assert!(!unfiltered.is_empty());

    let blocked = run(&graph, base().filter(|_: u64, _: &SocialProof| true));
    assert!(blocked.is_empty());

    let chain = FilterChain::new()
        .with(|node: u64, _: &SocialProof| node % 2 == 0)
        .with(|node: u64, _: &SocialProof| node > 115);
    let filtered = run(&graph, base().filters(chain));
    let expected: Vec<u64> = ids(&unfiltered)
        .into_iter()
        .filter(|node| node % 2 == 1 && *node <= 115)
        .collect();
    assert_eq!(ids(&filtered), expected);
}

#[test]
fn results_are_truncated_after_ranking() {
    let graph = community_graph();
    let all = run(
        &graph,
        SalsaRequest::builder(6).max_random_walk_length(4).max_num_results(50),
    );
    let top = run(
        &graph,
        SalsaRequest::builder(6).max_random_walk_length(4).max_num_results(3),
    );
    assert!(all.len() > 3);
    assert_eq!(top.as_slice(), &all[..3]);
    for pair in all.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn equal_scores_prefer_more_contributing_seeds() {
    let graph = graph(&[(1, 10), (2, 20), (3, 20)]);
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .query_node_weight_fraction(0.5)
            .seeds([(2, 0.5), (3, 0.5)])
            .max_random_walk_length(1),
    );
    assert_eq!(ids(&results), vec![20, 10]);
    assert_eq!(results[0].score, results[1].score);
    assert_eq!(results[0].social_proof[&0], vec![2, 3]);
}

#[test]
fn equal_contributions_prefer_recent_seeds() {
    // One edge per segment, so each edge carries its own engagement time.
    let graph = graph_with(&[(1, 10, 0, 1), (2, 20, 0, 2), (3, 20, 0, 3)], 1);
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .query_node_weight_fraction(0.5)
            .seeds([(2, 0.5), (3, 0.5)])
            .max_random_walk_length(1),
    );
    assert_eq!(results[0].node, 20);
    assert_eq!(results[0].social_proof[&0], vec![3, 2]);
}

#[test]
fn proof_is_bounded_and_masked() {
    let mut edges = Vec::new();
    for seed in 1..=6u64 {
        for ty in 0..4u8 {
            edges.push((seed, 50, ty, 0));
        }
    }
    edges.push((1, 51, 2, 0));
    let graph = graph_with(&edges, 1 << 16);
    let seeds: Vec<(u64, f64)> = (2..=6).map(|s| (s, 1.0)).collect();

    let bounded = run(
        &graph,
        SalsaRequest::builder(1)
            .seeds(seeds.clone())
            .max_social_proof_type_size(2)
            .max_social_proof_size(3)
            .max_random_walk_length(1),
    );
    let top = &bounded[0];
    assert_eq!(top.node, 50);
    assert_eq!(top.social_proof.len(), 2);
    assert!(top.social_proof.values().all(|seeds| seeds.len() == 3));
    // The query node carries most of the mass, so it leads every type.
    assert!(top.social_proof.values().all(|seeds| seeds[0] == 1));

    let masked = run(
        &graph,
        SalsaRequest::builder(1)
            .seeds(seeds)
            .social_proof_type_mask([2])
            .max_random_walk_length(1),
    );
    for result in &masked {
        let types: Vec<u8> = result.social_proof.keys().copied().collect();
        assert_eq!(types, vec![2], "node {}", result.node);
    }
}

#[test]
fn cosine_normalization_divides_by_degrees() {
    let graph = graph(&[(1, 10), (1, 20), (2, 20)]);
    let results = run(
        &graph,
        SalsaRequest::builder(1)
            .normalization(ScoreNormalization::Cosine)
            .max_random_walk_length(1),
    );
    assert_eq!(ids(&results), vec![10, 20]);
    assert!((results[0].score - 0.5 / 2f64.sqrt()).abs() < 1e-12);
    assert!((results[1].score - 0.25).abs() < 1e-12);
}

#[test]
fn cosine_with_isolated_query_node_is_negative_infinity() {
    let graph = graph(&[(1, 10), (1, 20)]);
    let results = run(
        &graph,
        SalsaRequest::builder(99)
            .seed(1, 1.0)
            .query_node_weight_fraction(0.5)
            .normalization(ScoreNormalization::Cosine)
            .max_random_walk_length(1),
    );
    assert_eq!(ids(&results), vec![10, 20]);
    assert!(results.iter().all(|r| r.score == f64::NEG_INFINITY));
}

#[test]
fn empty_graph_yields_empty_results() {
    let graph = graph(&[]);
    let results = run(&graph, SalsaRequest::builder(1).max_random_walk_length(5));
    assert!(results.is_empty());
}
