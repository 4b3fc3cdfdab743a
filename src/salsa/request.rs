use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::filter::{FilterChain, ResultFilter};
use crate::error::{GraphError, Result};

/// Default probability of jumping back to the seed set on a left step.
pub const DEFAULT_RESET_PROBABILITY: f64 = 0.3;
/// Default share of initial mass placed on the query node.
pub const DEFAULT_QUERY_NODE_WEIGHT_FRACTION: f64 = 0.9;
/// Default number of results returned.
pub const DEFAULT_MAX_NUM_RESULTS: usize = 10;
/// Default number of edge types kept per result's social proof.
pub const DEFAULT_MAX_SOCIAL_PROOF_TYPE_SIZE: usize = 4;
/// Default number of seeds kept per edge type in a result's social proof.
pub const DEFAULT_MAX_SOCIAL_PROOF_SIZE: usize = 10;

/// How walk mass moves across the graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WalkMode {
    /// Propagates the expected walker mass exactly; no randomness.
    #[default]
    Expected,
    /// Simulates `num_random_walks` discrete walkers with a seeded RNG.
    Sampled {
        /// RNG seed; equal seeds give equal results on the same snapshot.
        seed: u64,
    },
}

/// How accumulated mass is turned into the reported score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// Raw visit mass.
    #[default]
    Raw,
    /// Visit mass divided by `sqrt(deg(query) * deg(candidate))`.
    Cosine,
}

/// Query parameters that do not depend on the query node.
///
/// This is the part of a request a configuration file can carry; a
/// [`SalsaRequestBuilder`] starts from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SalsaSettings {
    /// Probability that a walker on a right node jumps back to the seeds.
    pub reset_probability: f64,
    /// Share of initial mass placed on the query node; the rest goes to seeds.
    pub query_node_weight_fraction: f64,
    /// Total walker mass (expected mode) or walker count (sampled mode).
    pub num_random_walks: usize,
    /// Half-steps per run. Has no default and must be set.
    pub max_random_walk_length: Option<usize>,
    /// Edge types kept per result's social proof.
    pub max_social_proof_type_size: usize,
    /// Seeds kept per edge type per result's social proof.
    pub max_social_proof_size: usize,
    /// Edge types that count as social proof; empty means all types.
    pub social_proof_type_mask: Vec<u8>,
    /// Results returned.
    pub max_num_results: usize,
    /// Propagation mode.
    pub walk_mode: WalkMode,
    /// Score normalization.
    pub normalization: ScoreNormalization,
}

impl Default for SalsaSettings {
    fn default() -> Self {
        Self {
            reset_probability: DEFAULT_RESET_PROBABILITY,
            query_node_weight_fraction: DEFAULT_QUERY_NODE_WEIGHT_FRACTION,
            num_random_walks: 1,
            max_random_walk_length: None,
            max_social_proof_type_size: DEFAULT_MAX_SOCIAL_PROOF_TYPE_SIZE,
            max_social_proof_size: DEFAULT_MAX_SOCIAL_PROOF_SIZE,
            social_proof_type_mask: Vec::new(),
            max_num_results: DEFAULT_MAX_NUM_RESULTS,
            walk_mode: WalkMode::default(),
            normalization: ScoreNormalization::default(),
        }
    }
}

impl SalsaSettings {
    /// Starts a request for `query_node` from these settings.
    pub fn request(&self, query_node: u64) -> SalsaRequestBuilder {
        SalsaRequestBuilder {
            query_node,
            settings: self.clone(),
            left_seeds: BTreeMap::new(),
            excluded: BTreeSet::new(),
            filters: FilterChain::new(),
        }
    }

    fn validate(&self) -> Result<usize> {
        if !(0.0..=1.0).contains(&self.reset_probability) {
            return Err(GraphError::config(format!(
                "reset_probability must be in [0, 1], got {}",
                self.reset_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.query_node_weight_fraction) {
            return Err(GraphError::config(format!(
                "query_node_weight_fraction must be in [0, 1], got {}",
                self.query_node_weight_fraction
            )));
        }
        if self.num_random_walks == 0 {
            return Err(GraphError::config("num_random_walks must be positive"));
        }
        let walk_length = match self.max_random_walk_length {
            Some(0) => return Err(GraphError::config("max_random_walk_length must be positive")),
            Some(length) => length,
            None => return Err(GraphError::config("max_random_walk_length must be set")),
        };
        if self.max_social_proof_type_size == 0 {
            return Err(GraphError::config("max_social_proof_type_size must be positive"));
        }
        if self.max_social_proof_size == 0 {
            return Err(GraphError::config("max_social_proof_size must be positive"));
        }
        if self.max_num_results == 0 {
            return Err(GraphError::config("max_num_results must be positive"));
        }
        Ok(walk_length)
    }
}

/// A validated, immutable SALSA query.
#[derive(Clone, Debug)]
pub struct SalsaRequest {
    query_node: u64,
    left_seeds: BTreeMap<u64, f64>,
    excluded: BTreeSet<u64>,
    settings: SalsaSettings,
    max_random_walk_length: usize,
    filters: FilterChain,
}

impl SalsaRequest {
    /// Starts a request for `query_node` with default settings.
    pub fn builder(query_node: u64) -> SalsaRequestBuilder {
        SalsaSettings::default().request(query_node)
    }

    /// The left node the recommendations are for.
    pub fn query_node(&self) -> u64 {
        self.query_node
    }

    /// Additional weighted left seeds.
    pub fn left_seeds(&self) -> &BTreeMap<u64, f64> {
        &self.left_seeds
    }

    /// Right nodes never returned.
    pub fn excluded(&self) -> &BTreeSet<u64> {
        &self.excluded
    }

    /// Reset probability of a left step.
    pub fn reset_probability(&self) -> f64 {
        self.settings.reset_probability
    }

    /// Share of initial mass on the query node.
    pub fn query_node_weight_fraction(&self) -> f64 {
        self.settings.query_node_weight_fraction
    }

    /// Walk budget.
    pub fn num_random_walks(&self) -> usize {
        self.settings.num_random_walks
    }

    /// Half-steps per run.
    pub fn max_random_walk_length(&self) -> usize {
        self.max_random_walk_length
    }

    /// Edge types kept per result's proof.
    pub fn max_social_proof_type_size(&self) -> usize {
        self.settings.max_social_proof_type_size
    }

    /// Seeds kept per edge type per result's proof.
    pub fn max_social_proof_size(&self) -> usize {
        self.settings.max_social_proof_size
    }

    /// Edge types that count as social proof; empty means all.
    pub fn social_proof_type_mask(&self) -> &[u8] {
        &self.settings.social_proof_type_mask
    }

    /// Returns true if edges of `edge_type` count as social proof.
    pub fn counts_as_proof(&self, edge_type: u8) -> bool {
        let mask = &self.settings.social_proof_type_mask;
        mask.is_empty() || mask.contains(&edge_type)
    }

    /// Results returned.
    pub fn max_num_results(&self) -> usize {
        self.settings.max_num_results
    }

    /// Propagation mode.
    pub fn walk_mode(&self) -> WalkMode {
        self.settings.walk_mode
    }

    /// Score normalization.
    pub fn normalization(&self) -> ScoreNormalization {
        self.settings.normalization
    }

    /// Filters applied to candidates.
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }
}

/// Builder for [`SalsaRequest`]; `build` validates every parameter.
#[derive(Clone, Debug)]
pub struct SalsaRequestBuilder {
    query_node: u64,
    settings: SalsaSettings,
    left_seeds: BTreeMap<u64, f64>,
    excluded: BTreeSet<u64>,
    filters: FilterChain,
}

impl SalsaRequestBuilder {
    /// Adds a weighted left seed; repeated seeds accumulate weight.
    pub fn seed(mut self, node: u64, weight: f64) -> Self {
        *self.left_seeds.entry(node).or_insert(0.0) += weight;
        self
    }

    /// Adds several weighted left seeds.
    pub fn seeds(mut self, seeds: impl IntoIterator<Item = (u64, f64)>) -> Self {
        for (node, weight) in seeds {
            self = self.seed(node, weight);
        }
        self
    }

    /// Excludes right nodes from the results.
    pub fn exclude(mut self, nodes: impl IntoIterator<Item = u64>) -> Self {
        self.excluded.extend(nodes);
        self
    }

    /// Sets the reset probability.
    pub fn reset_probability(mut self, probability: f64) -> Self {
        self.settings.reset_probability = probability;
        self
    }

    /// Sets the share of initial mass on the query node.
    pub fn query_node_weight_fraction(mut self, fraction: f64) -> Self {
        self.settings.query_node_weight_fraction = fraction;
        self
    }

    /// Sets the walk budget.
    pub fn num_random_walks(mut self, walks: usize) -> Self {
        self.settings.num_random_walks = walks;
        self
    }

    /// Sets the number of half-steps.
    pub fn max_random_walk_length(mut self, length: usize) -> Self {
        self.settings.max_random_walk_length = Some(length);
        self
    }

    /// Sets the number of edge types kept per proof.
    pub fn max_social_proof_type_size(mut self, size: usize) -> Self {
        self.settings.max_social_proof_type_size = size;
        self
    }

    /// Sets the number of seeds kept per edge type.
    pub fn max_social_proof_size(mut self, size: usize) -> Self {
        self.settings.max_social_proof_size = size;
        self
    }

    /// Restricts which edge types count as social proof.
    pub fn social_proof_type_mask(mut self, mask: impl IntoIterator<Item = u8>) -> Self {
        self.settings.social_proof_type_mask = mask.into_iter().collect();
        self
    }

    /// Sets the number of results.
    pub fn max_num_results(mut self, results: usize) -> Self {
        self.settings.max_num_results = results;
        self
    }

    /// Sets the propagation mode.
    pub fn walk_mode(mut self, mode: WalkMode) -> Self {
        self.settings.walk_mode = mode;
        self
    }

    /// Sets the score normalization.
    pub fn normalization(mut self, normalization: ScoreNormalization) -> Self {
        self.settings.normalization = normalization;
        self
    }

    /// Appends a filter to the chain.
    pub fn filter(mut self, filter: impl ResultFilter + 'static) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replaces the filter chain.
    pub fn filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// Validates and freezes the request.
    pub fn build(self) -> Result<SalsaRequest> {
        let max_random_walk_length = self.settings.validate()?;
        for (node, weight) in &self.left_seeds {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(GraphError::config(format!(
                    "seed {node} has invalid weight {weight}"
                )));
            }
        }
        if !self.left_seeds.is_empty()
            && self.left_seeds.values().sum::<f64>() <= 0.0
            && self.settings.query_node_weight_fraction < 1.0
        {
            return Err(GraphError::config("seed weights must not all be zero"));
        }
        Ok(SalsaRequest {
            query_node: self.query_node,
            left_seeds: self.left_seeds,
            excluded: self.excluded,
            settings: self.settings,
            max_random_walk_length,
            filters: self.filters,
        })
    }
}
