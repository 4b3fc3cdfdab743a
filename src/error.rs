//! Error type shared by the store and the walk engine.

use thiserror::Error;

/// Result alias used across the store and the walk engine.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the graph store and the SALSA engine.
///
/// Absent keys are never errors: unseen nodes and nodes without neighbors
/// produce empty results instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// Invalid options or request parameters, detected at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// An insertion would grow a structure past its configured bound.
    #[error("capacity exceeded: {what} limit is {limit}")]
    CapacityExceeded {
        /// The bounded resource (nodes, degree, segment edges).
        what: &'static str,
        /// The configured limit that was hit.
        limit: u64,
    },
    /// A node index or edge type does not fit in its packed bit width.
    #[error("{field} {value} exceeds representable maximum {max}")]
    EncodingRange {
        /// Which packed field overflowed.
        field: &'static str,
        /// The offending value.
        value: u64,
        /// Largest value the field can hold.
        max: u64,
    },
    /// A write was routed to a segment or pool that no longer accepts edges.
    #[error("{0} is sealed")]
    Sealed(String),
}

impl GraphError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        GraphError::Configuration(message.into())
    }

    pub(crate) fn capacity(what: &'static str, limit: u64) -> Self {
        GraphError::CapacityExceeded { what, limit }
    }

    /// Returns true if the error means the caller hit a configured bound.
    pub fn is_capacity(&self) -> bool {
        matches!(self, GraphError::CapacityExceeded { .. })
    }
}
