use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::edge_type::{BitMaskCodec, EdgeTypeMask, DEFAULT_TYPE_BITS};
use super::metrics::{default_metrics, GraphMetrics};
use super::pool::{PoolKind, MAX_MIN_CLASS_BITS};
use crate::error::{GraphError, Result};

/// Default number of edges a segment accepts before sealing.
pub const DEFAULT_SEGMENT_EDGE_CAPACITY: usize = 1 << 20;
/// Default number of retained segments.
pub const DEFAULT_MAX_SEGMENTS: usize = 8;
/// Default node bound per segment side.
pub const DEFAULT_MAX_NODES_PER_SEGMENT: usize = 1 << 20;
/// Default per-node degree bound inside one segment.
pub const DEFAULT_MAX_DEGREE: usize = 1 << 16;

/// Sizing knobs for a [`super::BipartiteGraph`].
///
/// This is the serializable part of [`GraphOptions`]; configuration files
/// deserialize into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphLimits {
    /// Adjacency layout for writable segments.
    pub pool: PoolKind,
    /// Edges a segment accepts before it seals.
    pub segment_edge_capacity: usize,
    /// Segments retained before the oldest is evicted.
    pub max_segments: usize,
    /// Distinct nodes per segment side.
    pub max_nodes_per_segment: usize,
    /// Edges per node per segment.
    pub max_degree: usize,
    /// Initial node-index table size hint.
    pub initial_node_capacity: usize,
    /// Smallest power-law size class is `2^min_size_class_bits` entries.
    pub min_size_class_bits: u32,
    /// High bits reserved for the edge type in packed adjacency values.
    pub edge_type_bits: u8,
    /// Whether sealing a segment immediately repacks it.
    pub optimize_on_seal: bool,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            pool: PoolKind::PowerLaw,
            segment_edge_capacity: DEFAULT_SEGMENT_EDGE_CAPACITY,
            max_segments: DEFAULT_MAX_SEGMENTS,
            max_nodes_per_segment: DEFAULT_MAX_NODES_PER_SEGMENT,
            max_degree: DEFAULT_MAX_DEGREE,
            initial_node_capacity: 1024,
            min_size_class_bits: 1,
            edge_type_bits: DEFAULT_TYPE_BITS,
            optimize_on_seal: false,
        }
    }
}

/// Configuration options supplied when creating a [`super::BipartiteGraph`].
#[derive(Clone)]
pub struct GraphOptions {
    /// Sizing and layout limits.
    pub limits: GraphLimits,
    /// Edge-type packing; defaults to a [`BitMaskCodec`] of `limits.edge_type_bits`.
    pub codec: Option<Arc<dyn EdgeTypeMask>>,
    /// Optional metrics collection implementation.
    pub metrics: Option<Arc<dyn GraphMetrics>>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphOptions {
    /// Creates options with default limits.
    pub fn new() -> Self {
        Self::from_limits(GraphLimits::default())
    }

    /// Creates options from already-loaded limits.
    pub fn from_limits(limits: GraphLimits) -> Self {
        Self {
            limits,
            codec: None,
            metrics: None,
        }
    }

    /// Sets the adjacency layout.
    pub fn pool(mut self, pool: PoolKind) -> Self {
        self.limits.pool = pool;
        self
    }

    /// Sets the number of edges per segment.
    pub fn segment_edge_capacity(mut self, edges: usize) -> Self {
        self.limits.segment_edge_capacity = edges;
        self
    }

    /// Sets the retention window in segments.
    pub fn max_segments(mut self, segments: usize) -> Self {
        self.limits.max_segments = segments;
        self
    }

    /// Sets the per-side node bound of a segment.
    pub fn max_nodes_per_segment(mut self, nodes: usize) -> Self {
        self.limits.max_nodes_per_segment = nodes;
        self
    }

    /// Sets the per-node degree bound of a segment.
    pub fn max_degree(mut self, degree: usize) -> Self {
        self.limits.max_degree = degree;
        self
    }

    /// Sets the initial node-index table size hint.
    pub fn initial_node_capacity(mut self, nodes: usize) -> Self {
        self.limits.initial_node_capacity = nodes;
        self
    }

    /// Sets the smallest power-law size class exponent.
    pub fn min_size_class_bits(mut self, bits: u32) -> Self {
        self.limits.min_size_class_bits = bits;
        self
    }

    /// Sets the edge-type width of the default codec.
    pub fn edge_type_bits(mut self, bits: u8) -> Self {
        self.limits.edge_type_bits = bits;
        self
    }

    /// Enables or disables repacking segments as they seal.
    pub fn optimize_on_seal(mut self, enabled: bool) -> Self {
        self.limits.optimize_on_seal = enabled;
        self
    }

    /// Replaces the edge-type codec.
    pub fn codec(mut self, codec: Arc<dyn EdgeTypeMask>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn GraphMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn resolved_codec(&self) -> Result<Arc<dyn EdgeTypeMask>> {
        match &self.codec {
            Some(codec) => Ok(Arc::clone(codec)),
            None => Ok(Arc::new(BitMaskCodec::new(self.limits.edge_type_bits)?)),
        }
    }

    pub(crate) fn resolved_metrics(&self) -> Arc<dyn GraphMetrics> {
        self.metrics.clone().unwrap_or_else(default_metrics)
    }

    /// Checks that the limits are usable together.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.segment_edge_capacity == 0 {
            return Err(GraphError::config("segment_edge_capacity must be positive"));
        }
        if limits.max_segments == 0 {
            return Err(GraphError::config("max_segments must be positive"));
        }
        if limits.max_degree == 0 {
            return Err(GraphError::config("max_degree must be positive"));
        }
        if limits.max_nodes_per_segment == 0 {
            return Err(GraphError::config("max_nodes_per_segment must be positive"));
        }
        if limits.min_size_class_bits > MAX_MIN_CLASS_BITS {
            return Err(GraphError::config(format!(
                "min_size_class_bits {} exceeds {MAX_MIN_CLASS_BITS}",
                limits.min_size_class_bits
            )));
        }
        let codec = self.resolved_codec()?;
        let addressable = u64::from(codec.max_index()) + 1;
        if limits.max_nodes_per_segment as u64 > addressable {
            return Err(GraphError::config(format!(
                "max_nodes_per_segment {} exceeds the {} indices the edge codec can address",
                limits.max_nodes_per_segment, addressable
            )));
        }
        if limits.pool == PoolKind::Uniform
            && limits
                .max_nodes_per_segment
                .checked_mul(limits.max_degree)
                .is_none()
        {
            return Err(GraphError::config(
                "uniform pool size max_nodes_per_segment * max_degree overflows",
            ));
        }
        Ok(())
    }
}
