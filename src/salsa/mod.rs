//! Personalized SALSA over a [`crate::storage::GraphSnapshot`].
//!
//! A query places walker mass on its query node and weighted left seeds,
//! then alternates right and left half-steps for a fixed number of steps.
//! Each left step sends a `reset_probability` share of the mass back to the
//! seeds, which keeps the walk close to the query's neighborhood. Right
//! nodes are ranked by the mass they received, annotated with the seeds
//! that sent it.

mod engine;
mod filter;
mod iteration;
mod proof;
mod ranking;
mod request;
mod state;

pub use engine::SalsaEngine;
pub use filter::{FilterChain, ResultFilter, SocialProof};
pub use iteration::{HalfStep, Walk};
pub use proof::ProofAccumulator;
pub use ranking::{cooccurrence_score, rank, RecommendationResult};
pub use request::{
    SalsaRequest, SalsaRequestBuilder, SalsaSettings, ScoreNormalization, WalkMode,
    DEFAULT_MAX_NUM_RESULTS, DEFAULT_MAX_SOCIAL_PROOF_SIZE, DEFAULT_MAX_SOCIAL_PROOF_TYPE_SIZE,
    DEFAULT_QUERY_NODE_WEIGHT_FRACTION, DEFAULT_RESET_PROBABILITY,
};
pub use state::{RightVisit, SalsaSubgraphState};
