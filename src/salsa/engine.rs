use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::iteration::{HalfStep, Walk};
use super::ranking::{rank, RecommendationResult};
use super::request::SalsaRequest;
use super::state::SalsaSubgraphState;
use crate::error::Result;
use crate::storage::{default_metrics, BipartiteGraph, GraphMetrics, GraphSnapshot};

/// Runs SALSA queries against graph snapshots.
///
/// The engine holds no per-query state; any number of threads may call
/// [`SalsaEngine::recommend`] on one engine at once.
#[derive(Clone)]
pub struct SalsaEngine {
    metrics: Arc<dyn GraphMetrics>,
}

impl Default for SalsaEngine {
    fn default() -> Self {
        Self::new(default_metrics())
    }
}

impl SalsaEngine {
    /// Creates an engine reporting to `metrics`.
    pub fn new(metrics: Arc<dyn GraphMetrics>) -> Self {
        Self { metrics }
    }

    /// Creates an engine sharing `graph`'s metrics sink.
    pub fn for_graph(graph: &BipartiteGraph) -> Self {
        Self::new(Arc::clone(graph.metrics()))
    }

    /// Walks `snapshot` from the request's seeds and returns ranked results.
    ///
    /// Runs exactly `max_random_walk_length` half-steps starting with a right
    /// step, or fewer if every walker hits a dead end first. An unknown query
    /// node yields an empty list.
    pub fn recommend(
        &self,
        snapshot: &GraphSnapshot,
        request: &SalsaRequest,
    ) -> Result<Vec<RecommendationResult>> {
        let start = Instant::now();
        let mut state = SalsaSubgraphState::new(request);
        let mut walk = Walk::start(snapshot, request, &mut state)?;
        let mut step = HalfStep::Right;
        for _ in 0..request.max_random_walk_length() {
            if state.is_exhausted() {
                break;
            }
            step.apply(&mut walk, &mut state);
            step = step.next();
        }
        let results = rank(&state, request, snapshot);
        let elapsed = start.elapsed();
        self.metrics.salsa_completed(elapsed, state.visited_right());
        debug!(
            query = request.query_node(),
            half_steps = state.half_steps(),
            visited = state.visited_right(),
            results = results.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "salsa.recommend"
        );
        Ok(results)
    }

    /// Convenience wrapper running against the graph's current window.
    pub fn recommend_latest(
        &self,
        graph: &BipartiteGraph,
        request: &SalsaRequest,
    ) -> Result<Vec<RecommendationResult>> {
        self.recommend(&graph.snapshot(), request)
    }
}

impl std::fmt::Debug for SalsaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalsaEngine").finish_non_exhaustive()
    }
}
