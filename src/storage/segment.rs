//! Bounded, append-only shard of the bipartite graph.
//!
//! A segment owns a node index per side and an adjacency pool per direction
//! (left -> right and right -> left). Internal indices are local to the
//! segment, so a whole segment can be dropped at eviction time without
//! touching any other segment.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::cursor::{Neighbor, NeighborCursor};
use super::edge_type::EdgeTypeMask;
use super::graph::Side;
use super::node_index::NodeIndex;
use super::options::GraphOptions;
use super::pool::{
    EdgePool, Optimizer, PoolKind, PoolStats, PowerLawEdgePool, UniformEdgePool,
};
use crate::error::{GraphError, Result};

/// One shard of the sliding window.
pub struct Segment {
    id: u64,
    edge_capacity: usize,
    codec: Arc<dyn EdgeTypeMask>,
    left_index: Arc<NodeIndex>,
    right_index: Arc<NodeIndex>,
    left_edges: Box<dyn EdgePool>,
    right_edges: Box<dyn EdgePool>,
    edges: AtomicUsize,
    sealed: AtomicBool,
    optimized: bool,
    min_time: AtomicI64,
    max_time: AtomicI64,
    writer: Mutex<()>,
}

impl Segment {
    /// Creates an empty writable segment.
    pub fn new(id: u64, options: &GraphOptions) -> Result<Self> {
        let limits = &options.limits;
        let metrics = options.resolved_metrics();
        let index = || {
            NodeIndex::new(
                limits.initial_node_capacity,
                limits.max_nodes_per_segment,
                Arc::clone(&metrics),
            )
            .map(Arc::new)
        };
        let pool = || -> Result<Box<dyn EdgePool>> {
            Ok(match limits.pool {
                PoolKind::Uniform => Box::new(UniformEdgePool::new(
                    limits.max_nodes_per_segment,
                    limits.max_degree,
                )?),
                PoolKind::PowerLaw => Box::new(PowerLawEdgePool::new(
                    limits.max_nodes_per_segment,
                    limits.segment_edge_capacity,
                    limits.max_degree,
                    limits.min_size_class_bits,
                    Arc::clone(&metrics),
                )?),
            })
        };
        Ok(Self {
            id,
            edge_capacity: limits.segment_edge_capacity,
            codec: options.resolved_codec()?,
            left_index: index()?,
            right_index: index()?,
            left_edges: pool()?,
            right_edges: pool()?,
            edges: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
            optimized: false,
            min_time: AtomicI64::new(i64::MAX),
            max_time: AtomicI64::new(i64::MIN),
            writer: Mutex::new(()),
        })
    }

    /// Segment id, increasing with creation order.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of published edges.
    pub fn edge_count(&self) -> usize {
        self.edges.load(Ordering::Acquire)
    }

    /// Edges accepted before the segment seals.
    pub fn edge_capacity(&self) -> usize {
        self.edge_capacity
    }

    /// Returns true once the segment stopped accepting writes.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Returns true if this segment was produced by [`Segment::optimized`].
    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Earliest and latest edge timestamps, if any edge was written.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        if self.edge_count() == 0 {
            return None;
        }
        Some((
            self.min_time.load(Ordering::Acquire),
            self.max_time.load(Ordering::Acquire),
        ))
    }

    /// Number of distinct nodes on `side`.
    pub fn node_count(&self, side: Side) -> usize {
        self.index(side).len()
    }

    /// Freezes the segment; later writes fail with `Sealed`.
    pub fn seal(&self) {
        let _writer = self.writer.lock();
        self.seal_locked();
    }

    fn seal_locked(&self) {
        self.left_edges.seal();
        self.right_edges.seal();
        self.sealed.store(true, Ordering::Release);
    }

    fn index(&self, side: Side) -> &NodeIndex {
        match side {
            Side::Left => &self.left_index,
            Side::Right => &self.right_index,
        }
    }

    fn pool(&self, side: Side) -> &dyn EdgePool {
        match side {
            Side::Left => self.left_edges.as_ref(),
            Side::Right => self.right_edges.as_ref(),
        }
    }

    /// Index `external` will receive on `side`: the existing one or the next free one.
    fn prospective_index(&self, side: Side, external: u64) -> Result<u32> {
        let index = self.index(side);
        if let Some(existing) = index.lookup_internal(external) {
            return Ok(existing);
        }
        if !index.can_accept(external) {
            return Err(GraphError::capacity("nodes", index.max_nodes() as u64));
        }
        let next = index.len() as u64;
        if next > u64::from(self.codec.max_index()) {
            return Err(GraphError::EncodingRange {
                field: "node index",
                value: next,
                max: u64::from(self.codec.max_index()),
            });
        }
        Ok(next as u32)
    }

    /// Appends one edge. Every bound is checked before any state changes, so
    /// a rejected edge leaves the segment untouched.
    ///
    /// The segment seals itself when the edge fills its capacity.
    pub fn add_edge(&self, left: u64, right: u64, edge_type: u8, timestamp: i64) -> Result<()> {
        let _writer = self.writer.lock();
        if self.is_sealed() {
            return Err(GraphError::Sealed(format!("segment {}", self.id)));
        }
        if self.edges.load(Ordering::Relaxed) >= self.edge_capacity {
            self.seal_locked();
            return Err(GraphError::Sealed(format!("segment {}", self.id)));
        }
        if edge_type > self.codec.max_edge_type() {
            return Err(GraphError::EncodingRange {
                field: "edge type",
                value: u64::from(edge_type),
                max: u64::from(self.codec.max_edge_type()),
            });
        }
        let left_slot = self.prospective_index(Side::Left, left)?;
        let right_slot = self.prospective_index(Side::Right, right)?;
        self.left_edges.check_add(left_slot)?;
        self.right_edges.check_add(right_slot)?;

        let left_node = self.left_index.get_or_create(left)?;
        let right_node = self.right_index.get_or_create(right)?;
        let to_right = self.codec.encode(right_node, edge_type)?;
        let to_left = self.codec.encode(left_node, edge_type)?;
        self.min_time.fetch_min(timestamp, Ordering::AcqRel);
        self.max_time.fetch_max(timestamp, Ordering::AcqRel);
        self.left_edges.add_edge(left_node, to_right)?;
        self.right_edges.add_edge(right_node, to_left)?;

        let count = self.edges.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.edge_capacity {
            self.seal_locked();
        }
        Ok(())
    }

    /// Number of edges `node` has on `side` in this segment.
    pub fn degree(&self, node: u64, side: Side) -> usize {
        self.index(side)
            .lookup_internal(node)
            .map(|internal| self.pool(side).degree(internal))
            .unwrap_or(0)
    }

    /// Appends `node`'s neighbors in this segment to `cursor`.
    ///
    /// The cursor is not reset, so callers can gather across segments.
    pub fn append_neighbors(&self, node: u64, side: Side, cursor: &mut NeighborCursor) {
        let Some(internal) = self.index(side).lookup_internal(node) else {
            return;
        };
        let mut scratch = std::mem::take(&mut cursor.scratch);
        scratch.clear();
        self.pool(side).read_into(internal, &mut scratch);
        let engaged_at = self.max_time.load(Ordering::Acquire);
        let other = self.index(side.opposite());
        for packed in scratch.iter().copied() {
            let Some(external) = other.lookup_external(self.codec.restore(packed)) else {
                continue;
            };
            cursor.push(Neighbor {
                node: external,
                edge_type: self.codec.edge_type(packed),
                engaged_at,
            });
        }
        cursor.scratch = scratch;
    }

    /// Occupancy of both pools combined.
    pub fn pool_stats(&self) -> PoolStats {
        let mut stats = self.left_edges.stats();
        stats.merge(&self.right_edges.stats());
        stats
    }

    /// Builds an exact-fit copy of this sealed segment.
    ///
    /// Node indices are shared with the source; only the pools are rebuilt.
    pub fn optimized(&self) -> Result<Segment> {
        if !self.is_sealed() {
            return Err(GraphError::config(format!(
                "segment {} must be sealed before optimization",
                self.id
            )));
        }
        let left_edges = Optimizer::optimize(self.left_edges.as_ref())?;
        let right_edges = Optimizer::optimize(self.right_edges.as_ref())?;
        Ok(Self {
            id: self.id,
            edge_capacity: self.edge_capacity,
            codec: Arc::clone(&self.codec),
            left_index: Arc::clone(&self.left_index),
            right_index: Arc::clone(&self.right_index),
            left_edges: Box::new(left_edges),
            right_edges: Box::new(right_edges),
            edges: AtomicUsize::new(self.edge_count()),
            sealed: AtomicBool::new(true),
            optimized: true,
            min_time: AtomicI64::new(self.min_time.load(Ordering::Acquire)),
            max_time: AtomicI64::new(self.max_time.load(Ordering::Acquire)),
            writer: Mutex::new(()),
        })
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("edges", &self.edge_count())
            .field("sealed", &self.is_sealed())
            .field("optimized", &self.optimized)
            .finish()
    }
}
