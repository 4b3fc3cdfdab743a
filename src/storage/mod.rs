//! In-memory bipartite graph store.
//!
//! Edges arrive as a stream of `(left, right, type, timestamp)` events and
//! land in the newest [`Segment`] of a [`BipartiteGraph`]. Each segment
//! translates external ids through a [`NodeIndex`] per side and keeps
//! adjacency in an [`EdgePool`] per direction. Readers never block the
//! writer: every growable structure publishes new storage atomically and
//! bumps lengths only after the values behind them are written.

mod chunked;
mod cursor;
mod edge_type;
mod graph;
mod metrics;
mod node_index;
mod options;
mod segment;

/// Adjacency pools used inside segments.
pub mod pool;

pub use cursor::{Neighbor, NeighborCursor};
pub use edge_type::{BitMaskCodec, EdgeTypeMask, DEFAULT_TYPE_BITS, MAX_TYPE_BITS};
pub use graph::{BipartiteGraph, GraphSnapshot, GraphStats, Side};
pub use metrics::{default_metrics, CounterMetrics, GraphMetrics, NoopMetrics};
pub use node_index::NodeIndex;
pub use options::{
    GraphLimits, GraphOptions, DEFAULT_MAX_DEGREE, DEFAULT_MAX_NODES_PER_SEGMENT,
    DEFAULT_MAX_SEGMENTS, DEFAULT_SEGMENT_EDGE_CAPACITY,
};
pub use pool::{EdgePool, PoolKind, PoolStats};
pub use segment::Segment;
