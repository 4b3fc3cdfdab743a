//! Per-query working set of a SALSA run.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::proof::ProofAccumulator;
use super::request::SalsaRequest;

/// Accumulated state of one visited right node.
#[derive(Clone, Debug, Default)]
pub struct RightVisit {
    /// Walk mass received over the whole run.
    pub mass: f64,
    /// Seeds and edge types the mass arrived through.
    pub proof: ProofAccumulator,
}

/// Working set of a single SALSA query.
///
/// Nodes are keyed by external id because internal indices are local to a
/// segment. Frontiers are ordered maps so that iteration order, and hence
/// floating point summation and RNG consumption, is reproducible.
#[derive(Debug)]
pub struct SalsaSubgraphState {
    pub(crate) left_frontier: BTreeMap<u64, f64>,
    pub(crate) right_frontier: BTreeMap<u64, f64>,
    pub(crate) visits: FxHashMap<u64, RightVisit>,
    seed_distribution: Vec<(u64, f64)>,
    seeds: FxHashSet<u64>,
    pub(crate) half_steps: usize,
}

impl SalsaSubgraphState {
    /// Creates the initial state for `request` with no mass placed yet.
    pub fn new(request: &SalsaRequest) -> Self {
        let seed_distribution = seed_distribution(request);
        let mut seeds: FxHashSet<u64> = request.left_seeds().keys().copied().collect();
        seeds.insert(request.query_node());
        Self {
            left_frontier: BTreeMap::new(),
            right_frontier: BTreeMap::new(),
            visits: FxHashMap::default(),
            seed_distribution,
            seeds,
            half_steps: 0,
        }
    }

    /// Places `total` mass on the left side following the seed distribution.
    pub fn seed_expected(&mut self, total: f64) {
        for &(node, weight) in &self.seed_distribution {
            *self.left_frontier.entry(node).or_insert(0.0) += total * weight;
        }
    }

    /// Places `walkers` whole walkers on the left side, apportioned to the
    /// seed distribution by largest remainder (ties go to the smaller id).
    pub fn seed_walkers(&mut self, walkers: usize) {
        for (node, count) in apportion(&self.seed_distribution, walkers) {
            *self.left_frontier.entry(node).or_insert(0.0) += count as f64;
        }
    }

    /// Normalized reset distribution: `(left node, probability)` sorted by node.
    pub fn seed_distribution(&self) -> &[(u64, f64)] {
        &self.seed_distribution
    }

    /// Returns true if `node` is the query node or a left seed.
    pub fn is_seed(&self, node: u64) -> bool {
        self.seeds.contains(&node)
    }

    /// Visited right nodes.
    pub fn visits(&self) -> &FxHashMap<u64, RightVisit> {
        &self.visits
    }

    /// Number of distinct right nodes that received mass.
    pub fn visited_right(&self) -> usize {
        self.visits.len()
    }

    /// Half-steps applied so far.
    pub fn half_steps(&self) -> usize {
        self.half_steps
    }

    /// Mass currently in flight on both sides.
    pub fn frontier_mass(&self) -> f64 {
        self.left_frontier.values().sum::<f64>() + self.right_frontier.values().sum::<f64>()
    }

    /// Returns true once no walker is left to move.
    pub fn is_exhausted(&self) -> bool {
        self.left_frontier.is_empty() && self.right_frontier.is_empty()
    }
}

/// The query node gets `query_node_weight_fraction` of the mass and the
/// seeds share the rest in proportion to their weights. Without seeds the
/// query node gets everything.
fn seed_distribution(request: &SalsaRequest) -> Vec<(u64, f64)> {
    let mut weights: BTreeMap<u64, f64> = BTreeMap::new();
    let seed_total: f64 = request.left_seeds().values().sum();
    if seed_total > 0.0 {
        let fraction = request.query_node_weight_fraction();
        weights.insert(request.query_node(), fraction);
        for (&node, &weight) in request.left_seeds() {
            *weights.entry(node).or_insert(0.0) += (1.0 - fraction) * weight / seed_total;
        }
    } else {
        weights.insert(request.query_node(), 1.0);
    }
    weights.into_iter().filter(|(_, w)| *w > 0.0).collect()
}

fn apportion(distribution: &[(u64, f64)], walkers: usize) -> Vec<(u64, usize)> {
    let mut counts: Vec<(u64, usize, f64)> = distribution
        .iter()
        .map(|&(node, weight)| {
            let exact = weight * walkers as f64;
            let whole = exact.floor();
            (node, whole as usize, exact - whole)
        })
        .collect();
    let assigned: usize = counts.iter().map(|c| c.1).sum();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        counts[b]
            .2
            .total_cmp(&counts[a].2)
            .then_with(|| counts[a].0.cmp(&counts[b].0))
    });
    for &i in order.iter().take(walkers.saturating_sub(assigned)) {
        counts[i].1 += 1;
    }
    counts
        .into_iter()
        .filter(|c| c.1 > 0)
        .map(|(node, count, _)| (node, count))
        .collect()
}
