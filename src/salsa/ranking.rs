//! Turns a finished walk into ranked, filtered, proof-annotated results.

use std::cmp::Ordering;

use serde::Serialize;

use super::filter::SocialProof;
use super::proof::contributing_seeds;
use super::request::{SalsaRequest, ScoreNormalization};
use super::state::SalsaSubgraphState;
use crate::storage::{GraphSnapshot, Side};

/// One recommended right node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendationResult {
    /// External id of the recommended node.
    pub node: u64,
    /// Score after normalization.
    pub score: f64,
    /// Seeds per edge type that led to this node.
    pub social_proof: SocialProof,
}

/// Co-occurrence count normalized by the geometric mean of two degrees.
///
/// A zero denominator yields negative infinity whatever the numerator.
pub fn cooccurrence_score(
    cooccurrence: f64,
    node_degree: usize,
    similar_node_degree: usize,
) -> f64 {
    let denominator = (node_degree as f64 * similar_node_degree as f64).sqrt();
    if denominator == 0.0 {
        f64::NEG_INFINITY
    } else {
        cooccurrence / denominator
    }
}

struct Candidate {
    result: RecommendationResult,
    seeds: usize,
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.result
        .score
        .total_cmp(&a.result.score)
        .then_with(|| b.seeds.cmp(&a.seeds))
        .then_with(|| a.result.node.cmp(&b.result.node))
}

/// Ranks the right nodes visited in `state`.
///
/// Excluded nodes and nodes dropped by the filter chain are removed first.
/// The rest are ordered by score (highest first), then by number of
/// contributing seeds, then by smaller node id, and truncated to
/// `max_num_results`.
pub fn rank(
    state: &SalsaSubgraphState,
    request: &SalsaRequest,
    snapshot: &GraphSnapshot,
) -> Vec<RecommendationResult> {
    let query_degree = match request.normalization() {
        ScoreNormalization::Raw => 0,
        ScoreNormalization::Cosine => snapshot.degree(request.query_node(), Side::Left),
    };
    let mut candidates: Vec<Candidate> = state
        .visits()
        .iter()
        .filter(|(node, _)| !request.excluded().contains(*node))
        .filter_map(|(&node, visit)| {
            let social_proof = visit.proof.finalize(
                request.max_social_proof_type_size(),
                request.max_social_proof_size(),
            );
            if request.filters().exclude(node, &social_proof) {
                return None;
            }
            let score = match request.normalization() {
                ScoreNormalization::Raw => visit.mass,
                ScoreNormalization::Cosine => cooccurrence_score(
                    visit.mass,
                    query_degree,
                    snapshot.degree(node, Side::Right),
                ),
            };
            Some(Candidate {
                seeds: contributing_seeds(&social_proof),
                result: RecommendationResult {
                    node,
                    score,
                    social_proof,
                },
            })
        })
        .collect();
    candidates.sort_by(compare);
    candidates.truncate(request.max_num_results());
    candidates.into_iter().map(|c| c.result).collect()
}
