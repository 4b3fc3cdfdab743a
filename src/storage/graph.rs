//! Sliding window of segments.
//!
//! Writes go to the newest segment; when it seals a fresh one is opened and
//! the oldest sealed segment is dropped once the window exceeds
//! `max_segments`. The segment list is published as an immutable
//! [`GraphSnapshot`] behind an `Arc`: readers clone it and keep iterating
//! evicted segments until they drop the snapshot, while new readers only see
//! the current window.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cursor::{Neighbor, NeighborCursor};
use super::metrics::GraphMetrics;
use super::options::GraphOptions;
use super::pool::PoolStats;
use super::segment::Segment;
use crate::error::{GraphError, Result};

/// Which half of the bipartite graph a node belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Engaging entities (users).
    Left,
    /// Engaged-with entities (items).
    Right,
}

impl Side {
    /// Returns the other side.
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Aggregate occupancy of the window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Segments currently routed to.
    pub segments: usize,
    /// Of which sealed.
    pub sealed_segments: usize,
    /// Of which repacked by the optimizer.
    pub optimized_segments: usize,
    /// Edges across the window.
    pub edges: usize,
    /// Per-segment left node counts summed (a node present in two segments counts twice).
    pub left_nodes: usize,
    /// Per-segment right node counts summed.
    pub right_nodes: usize,
    /// Earliest and latest edge timestamps across the window.
    pub time_range: Option<(i64, i64)>,
    /// Pool occupancy summed over all segments.
    pub pools: PoolStats,
}

/// Immutable view of the segment window at one point in time.
///
/// Segments in a snapshot may still receive edges (the newest one is
/// writable), but the set of segments never changes.
#[derive(Clone, Debug)]
pub struct GraphSnapshot {
    segments: Arc<[Arc<Segment>]>,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl GraphSnapshot {
    fn new(segments: Vec<Arc<Segment>>) -> Self {
        Self {
            segments: segments.into(),
        }
    }

    /// Segments oldest first.
    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    /// Loads `node`'s neighbors from every segment, oldest first, into `cursor`.
    pub fn neighbors_into(&self, node: u64, side: Side, cursor: &mut NeighborCursor) {
        cursor.reset(side);
        for segment in self.segments.iter() {
            segment.append_neighbors(node, side, cursor);
        }
    }

    /// Like [`Self::neighbors_into`], skipping segments whose newest edge is older than `min_time`.
    pub fn neighbors_since(
        &self,
        node: u64,
        side: Side,
        min_time: i64,
        cursor: &mut NeighborCursor,
    ) {
        cursor.reset(side);
        for segment in self.segments.iter() {
            match segment.time_range() {
                Some((_, newest)) if newest >= min_time => {
                    segment.append_neighbors(node, side, cursor)
                }
                _ => {}
            }
        }
    }

    /// Returns `node`'s neighbors as a fresh vector.
    pub fn neighbors(&self, node: u64, side: Side) -> Vec<Neighbor> {
        let mut cursor = NeighborCursor::new();
        self.neighbors_into(node, side, &mut cursor);
        cursor.collect()
    }

    /// Number of edges `node` has on `side` across the window.
    pub fn degree(&self, node: u64, side: Side) -> usize {
        self.segments.iter().map(|s| s.degree(node, side)).sum()
    }

    /// Aggregate occupancy.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            segments: self.segments.len(),
            ..GraphStats::default()
        };
        for segment in self.segments.iter() {
            stats.sealed_segments += usize::from(segment.is_sealed());
            stats.optimized_segments += usize::from(segment.is_optimized());
            stats.edges += segment.edge_count();
            stats.left_nodes += segment.node_count(Side::Left);
            stats.right_nodes += segment.node_count(Side::Right);
            stats.pools.merge(&segment.pool_stats());
            if let Some((lo, hi)) = segment.time_range() {
                stats.time_range = Some(match stats.time_range {
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                    None => (lo, hi),
                });
            }
        }
        stats
    }
}

struct WriterState {
    next_segment_id: u64,
}

/// Real-time bipartite graph over a sliding window of segments.
///
/// Shared between one writer and many readers through `&self`; writes are
/// serialized internally.
pub struct BipartiteGraph {
    options: GraphOptions,
    metrics: Arc<dyn GraphMetrics>,
    published: RwLock<GraphSnapshot>,
    writer: Mutex<WriterState>,
}

impl BipartiteGraph {
    /// Creates an empty graph.
    pub fn new(options: GraphOptions) -> Result<Self> {
        options.validate()?;
        let metrics = options.resolved_metrics();
        Ok(Self {
            options,
            metrics,
            published: RwLock::new(GraphSnapshot::default()),
            writer: Mutex::new(WriterState { next_segment_id: 0 }),
        })
    }

    /// Options the graph was created with.
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Metrics sink shared with queries over this graph.
    pub fn metrics(&self) -> &Arc<dyn GraphMetrics> {
        &self.metrics
    }

    /// Returns the current window.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.published.read().clone()
    }

    fn publish(&self, segments: Vec<Arc<Segment>>) {
        *self.published.write() = GraphSnapshot::new(segments);
    }

    /// Adds one edge to the writable segment, opening a new segment first if
    /// the current one is sealed.
    pub fn add_edge(&self, left: u64, right: u64, edge_type: u8, timestamp: i64) -> Result<()> {
        let mut writer = self.writer.lock();
        let current = match self.snapshot().segments().last() {
            Some(segment) if !segment.is_sealed() => Arc::clone(segment),
            _ => self.open_segment(&mut writer)?,
        };
        if let Err(err) = current.add_edge(left, right, edge_type, timestamp) {
            self.metrics.edge_rejected();
            debug!(left, right, edge_type, error = %err, "graph.add_edge.rejected");
            return Err(err);
        }
        self.metrics.edge_added();
        if current.is_sealed() {
            self.on_sealed(&current);
        }
        Ok(())
    }

    /// Seals the writable segment now, e.g. on a time-based rollover.
    ///
    /// Returns false if there was nothing to seal.
    pub fn seal_current(&self) -> bool {
        let _writer = self.writer.lock();
        match self.snapshot().segments().last() {
            Some(segment) if !segment.is_sealed() && segment.edge_count() > 0 => {
                segment.seal();
                self.on_sealed(segment);
                true
            }
            _ => false,
        }
    }

    /// Repacks every sealed, not yet optimized segment. Returns how many were rebuilt.
    pub fn optimize_sealed(&self) -> Result<usize> {
        let _writer = self.writer.lock();
        let mut segments = self.snapshot().segments().to_vec();
        let mut rebuilt = 0;
        for slot in segments.iter_mut() {
            if slot.is_sealed() && !slot.is_optimized() {
                *slot = Arc::new(self.optimize_segment(slot)?);
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            self.publish(segments);
        }
        Ok(rebuilt)
    }

    fn optimize_segment(&self, segment: &Segment) -> Result<Segment> {
        let before = segment.pool_stats().wasted_entries();
        let optimized = segment.optimized()?;
        self.metrics.segment_optimized(before as u64);
        debug!(segment = segment.id(), reclaimed = before, "graph.segment.optimized");
        Ok(optimized)
    }

    fn on_sealed(&self, segment: &Arc<Segment>) {
        self.metrics.segment_sealed();
        info!(
            segment = segment.id(),
            edges = segment.edge_count(),
            "graph.segment.sealed"
        );
        if !self.options.limits.optimize_on_seal {
            return;
        }
        match self.optimize_segment(segment) {
            Ok(optimized) => {
                let optimized = Arc::new(optimized);
                let segments = self
                    .snapshot()
                    .segments()
                    .iter()
                    .map(|s| {
                        if Arc::ptr_eq(s, segment) {
                            Arc::clone(&optimized)
                        } else {
                            Arc::clone(s)
                        }
                    })
                    .collect();
                self.publish(segments);
            }
            Err(err) => warn!(segment = segment.id(), error = %err, "graph.segment.optimize_failed"),
        }
    }

    fn open_segment(&self, writer: &mut WriterState) -> Result<Arc<Segment>> {
        let id = writer.next_segment_id;
        let segment = Arc::new(Segment::new(id, &self.options)?);
        writer.next_segment_id += 1;
        let mut segments = self.snapshot().segments().to_vec();
        segments.push(Arc::clone(&segment));
        while segments.len() > self.options.limits.max_segments {
            let evicted = segments.remove(0);
            if !evicted.is_sealed() {
                return Err(GraphError::config("only sealed segments can be evicted"));
            }
            self.metrics.segment_evicted();
            info!(
                segment = evicted.id(),
                edges = evicted.edge_count(),
                "graph.segment.evicted"
            );
        }
        self.publish(segments);
        debug!(segment = id, "graph.segment.opened");
        Ok(segment)
    }

    /// Returns `node`'s neighbors across the current window.
    pub fn neighbors(&self, node: u64, side: Side) -> Vec<Neighbor> {
        self.snapshot().neighbors(node, side)
    }

    /// Loads `node`'s neighbors into a reusable cursor.
    pub fn neighbors_into(&self, node: u64, side: Side, cursor: &mut NeighborCursor) {
        self.snapshot().neighbors_into(node, side, cursor)
    }

    /// Loads only neighbors from segments holding edges at or after `min_time`.
    pub fn neighbors_since(
        &self,
        node: u64,
        side: Side,
        min_time: i64,
        cursor: &mut NeighborCursor,
    ) {
        self.snapshot().neighbors_since(node, side, min_time, cursor)
    }

    /// Number of edges `node` has on `side` across the current window.
    pub fn degree(&self, node: u64, side: Side) -> usize {
        self.snapshot().degree(node, side)
    }

    /// Aggregate occupancy of the current window.
    pub fn stats(&self) -> GraphStats {
        self.snapshot().stats()
    }
}
