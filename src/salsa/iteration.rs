//! Half-steps of the bidirectional walk.
//!
//! A run alternates [`HalfStep::Right`] (left nodes push mass to their right
//! neighbors) and [`HalfStep::Left`] (right nodes push mass back to their
//! left neighbors, minus the reset share that returns to the seeds).

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use super::request::{SalsaRequest, WalkMode};
use super::state::SalsaSubgraphState;
use crate::error::{GraphError, Result};
use crate::storage::{GraphSnapshot, NeighborCursor, Side};

/// One direction of the walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalfStep {
    /// Left to right.
    Right,
    /// Right to left, with reset.
    Left,
}

impl HalfStep {
    /// The step that follows this one.
    pub fn next(self) -> Self {
        match self {
            HalfStep::Right => HalfStep::Left,
            HalfStep::Left => HalfStep::Right,
        }
    }

    /// Applies this half-step to `state`.
    pub fn apply(self, walk: &mut Walk<'_>, state: &mut SalsaSubgraphState) {
        match (self, walk.sampler.is_some()) {
            (HalfStep::Right, false) => walk.right_expected(state),
            (HalfStep::Left, false) => walk.left_expected(state),
            (HalfStep::Right, true) => walk.right_sampled(state),
            (HalfStep::Left, true) => walk.left_sampled(state),
        }
        state.half_steps += 1;
        trace!(
            step = ?self,
            half_steps = state.half_steps,
            left = state.left_frontier.len(),
            right = state.right_frontier.len(),
            "salsa.half_step"
        );
    }
}

struct Sampler {
    rng: ChaCha8Rng,
    resets: WeightedIndex<f64>,
}

/// Read-side context shared by every half-step of one run.
pub struct Walk<'a> {
    snapshot: &'a GraphSnapshot,
    request: &'a SalsaRequest,
    cursor: NeighborCursor,
    sampler: Option<Sampler>,
}

impl<'a> Walk<'a> {
    /// Prepares a run of `request` over `snapshot` and places the initial
    /// mass into `state`.
    pub fn start(
        snapshot: &'a GraphSnapshot,
        request: &'a SalsaRequest,
        state: &mut SalsaSubgraphState,
    ) -> Result<Self> {
        let sampler = match request.walk_mode() {
            WalkMode::Expected => {
                state.seed_expected(request.num_random_walks() as f64);
                None
            }
            WalkMode::Sampled { seed } => {
                let weights = state.seed_distribution().iter().map(|&(_, w)| w);
                let resets = WeightedIndex::new(weights)
                    .map_err(|err| GraphError::config(format!("seed distribution: {err}")))?;
                state.seed_walkers(request.num_random_walks());
                Some(Sampler {
                    rng: ChaCha8Rng::seed_from_u64(seed),
                    resets,
                })
            }
        };
        Ok(Self {
            snapshot,
            request,
            cursor: NeighborCursor::new(),
            sampler,
        })
    }

    fn right_expected(&mut self, state: &mut SalsaSubgraphState) {
        let frontier = std::mem::take(&mut state.left_frontier);
        let max_types = self.request.max_social_proof_type_size();
        for (left, mass) in frontier {
            self.snapshot.neighbors_into(left, Side::Left, &mut self.cursor);
            if self.cursor.is_empty() {
                continue;
            }
            let share = mass / self.cursor.len() as f64;
            let from_seed = state.is_seed(left);
            for neighbor in self.cursor.as_slice() {
                *state.right_frontier.entry(neighbor.node).or_insert(0.0) += share;
                let visit = state.visits.entry(neighbor.node).or_default();
                visit.mass += share;
                if from_seed && self.request.counts_as_proof(neighbor.edge_type) {
                    visit.proof.record(
                        neighbor.edge_type,
                        left,
                        share,
                        neighbor.engaged_at,
                        max_types,
                    );
                }
            }
        }
    }

    fn left_expected(&mut self, state: &mut SalsaSubgraphState) {
        let frontier = std::mem::take(&mut state.right_frontier);
        let reset = self.request.reset_probability();
        let mut reset_mass = 0.0;
        for (right, mass) in frontier {
            reset_mass += reset * mass;
            self.snapshot.neighbors_into(right, Side::Right, &mut self.cursor);
            if self.cursor.is_empty() {
                continue;
            }
            let share = (1.0 - reset) * mass / self.cursor.len() as f64;
            if share == 0.0 {
                continue;
            }
            for neighbor in self.cursor.as_slice() {
                *state.left_frontier.entry(neighbor.node).or_insert(0.0) += share;
            }
        }
        if reset_mass > 0.0 {
            let distribution = state.seed_distribution().to_vec();
            for (seed, weight) in distribution {
                *state.left_frontier.entry(seed).or_insert(0.0) += reset_mass * weight;
            }
        }
    }

    fn right_sampled(&mut self, state: &mut SalsaSubgraphState) {
        let Some(sampler) = self.sampler.as_mut() else {
            return;
        };
        let frontier = std::mem::take(&mut state.left_frontier);
        let max_types = self.request.max_social_proof_type_size();
        let mut arrivals: BTreeMap<u64, f64> = BTreeMap::new();
        for (left, walkers) in frontier {
            self.snapshot.neighbors_into(left, Side::Left, &mut self.cursor);
            if self.cursor.is_empty() {
                continue;
            }
            let from_seed = state.is_seed(left);
            for _ in 0..walkers as usize {
                let pick = sampler.rng.gen_range(0..self.cursor.len());
                let neighbor = self.cursor.as_slice()[pick];
                *arrivals.entry(neighbor.node).or_insert(0.0) += 1.0;
                let visit = state.visits.entry(neighbor.node).or_default();
                visit.mass += 1.0;
                if from_seed && self.request.counts_as_proof(neighbor.edge_type) {
                    visit.proof.record(
                        neighbor.edge_type,
                        left,
                        1.0,
                        neighbor.engaged_at,
                        max_types,
                    );
                }
            }
        }
        state.right_frontier = arrivals;
    }

    fn left_sampled(&mut self, state: &mut SalsaSubgraphState) {
        let Some(sampler) = self.sampler.as_mut() else {
            return;
        };
        let frontier = std::mem::take(&mut state.right_frontier);
        let reset = self.request.reset_probability();
        let distribution = state.seed_distribution();
        let mut arrivals: BTreeMap<u64, f64> = BTreeMap::new();
        for (right, walkers) in frontier {
            self.snapshot.neighbors_into(right, Side::Right, &mut self.cursor);
            for _ in 0..walkers as usize {
                let target = if sampler.rng.gen_bool(reset) {
                    distribution[sampler.resets.sample(&mut sampler.rng)].0
                } else if self.cursor.is_empty() {
                    continue;
                } else {
                    let pick = sampler.rng.gen_range(0..self.cursor.len());
                    self.cursor.as_slice()[pick].node
                };
                *arrivals.entry(target).or_insert(0.0) += 1.0;
            }
        }
        state.left_frontier = arrivals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BipartiteGraph, GraphOptions};

    fn graph(edges: &[(u64, u64)]) -> BipartiteGraph {
        let graph = BipartiteGraph::new(
            GraphOptions::new()
                .segment_edge_capacity(1024)
                .max_nodes_per_segment(1024)
                .max_degree(64),
        )
        .unwrap();
        for &(left, right) in edges {
            graph.add_edge(left, right, 0, 0).unwrap();
        }
        graph
    }

    #[test]
    fn steps_alternate() {
        assert_eq!(HalfStep::Right.next(), HalfStep::Left);
        assert_eq!(HalfStep::Left.next(), HalfStep::Right);
    }

    #[test]
    fn right_step_splits_mass_by_degree() {
        let graph = graph(&[(1, 10), (1, 11), (1, 12), (1, 13)]);
        let snapshot = graph.snapshot();
        let request = SalsaRequest::builder(1).max_random_walk_length(1).build().unwrap();
        let mut state = SalsaSubgraphState::new(&request);
        let mut walk = Walk::start(&snapshot, &request, &mut state).unwrap();
        HalfStep::Right.apply(&mut walk, &mut state);

        assert!(state.left_frontier.is_empty());
        for right in 10..14 {
            assert_eq!(state.visits()[&right].mass, 0.25);
        }
        assert_eq!(state.half_steps(), 1);
    }

    #[test]
    fn full_reset_returns_all_mass_to_seeds() {
        let graph = graph(&[(1, 10), (2, 10), (3, 10)]);
        let snapshot = graph.snapshot();
        let request = SalsaRequest::builder(1)
            .reset_probability(1.0)
            .max_random_walk_length(2)
            .build()
            .unwrap();
        let mut state = SalsaSubgraphState::new(&request);
        let mut walk = Walk::start(&snapshot, &request, &mut state).unwrap();
        HalfStep::Right.apply(&mut walk, &mut state);
        HalfStep::Left.apply(&mut walk, &mut state);

        assert_eq!(state.left_frontier.len(), 1);
        assert_eq!(state.left_frontier.get(&1), Some(&1.0));
    }

    #[test]
    fn no_reset_follows_edges_only() {
        let graph = graph(&[(1, 10), (2, 10)]);
        let snapshot = graph.snapshot();
        let request = SalsaRequest::builder(1)
            .reset_probability(0.0)
            .max_random_walk_length(2)
            .build()
            .unwrap();
        let mut state = SalsaSubgraphState::new(&request);
        let mut walk = Walk::start(&snapshot, &request, &mut state).unwrap();
        HalfStep::Right.apply(&mut walk, &mut state);
        HalfStep::Left.apply(&mut walk, &mut state);

        assert_eq!(state.left_frontier.get(&1), Some(&0.5));
        assert_eq!(state.left_frontier.get(&2), Some(&0.5));
    }

    #[test]
    fn sampled_walkers_are_conserved_without_dead_ends() {
        let graph = graph(&[(1, 10), (1, 11), (2, 10), (2, 11)]);
        let snapshot = graph.snapshot();
        let request = SalsaRequest::builder(1)
            .num_random_walks(50)
            .walk_mode(WalkMode::Sampled { seed: 7 })
            .max_random_walk_length(4)
            .build()
            .unwrap();
        let mut state = SalsaSubgraphState::new(&request);
        let mut walk = Walk::start(&snapshot, &request, &mut state).unwrap();
        let mut step = HalfStep::Right;
        for _ in 0..4 {
            step.apply(&mut walk, &mut state);
            assert_eq!(state.frontier_mass(), 50.0);
            step = step.next();
        }
    }
}
