//! Per-node adjacency storage inside a segment.
//!
//! A pool maps a dense internal node index to the ordered list of packed
//! edge values written for it. Three layouts share the [`EdgePool`] trait:
//!
//! - [`UniformEdgePool`]: one fixed `max_degree` slot per node. Simple, but
//!   wastes memory when degrees follow a power law.
//! - [`PowerLawEdgePool`]: power-of-two size classes; a node is promoted to
//!   the next class when its slot fills up.
//! - [`OptimizedEdgePool`]: exact-fit, read-only layout produced by
//!   [`Optimizer::optimize`] from a sealed pool.
//!
//! All pools follow the same publication rule: the edge value is stored
//! first and the node's length counter is bumped afterwards with `Release`,
//! so a reader that loads the length with `Acquire` never sees a torn edge.

mod optimized;
mod power_law;
mod uniform;

pub use optimized::{OptimizedEdgePool, Optimizer};
pub use power_law::{PowerLawEdgePool, SlotHandle, MAX_MIN_CLASS_BITS};
pub use uniform::UniformEdgePool;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Adjacency layout used for the writable segment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Fixed `max_degree` slot per node.
    Uniform,
    /// Power-of-two size classes with promotion.
    #[default]
    PowerLaw,
}

/// Occupancy of one size class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeClassStats {
    /// Entries per slot in this class.
    pub slot_len: usize,
    /// Slots currently owned by a node.
    pub slots_in_use: usize,
    /// Released slots waiting for reuse (free or not yet reclaimable).
    pub slots_released: usize,
}

/// Occupancy summary for a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of node indices the pool has seen (highest index + 1).
    pub nodes: usize,
    /// Number of stored edges.
    pub edges: usize,
    /// Entries reserved for nodes, including slack in partially filled slots.
    pub reserved_entries: usize,
    /// Per size class occupancy; empty for layouts without size classes.
    pub size_classes: Vec<SizeClassStats>,
}

impl PoolStats {
    /// Reserved entries that hold no edge.
    pub fn wasted_entries(&self) -> usize {
        self.reserved_entries.saturating_sub(self.edges)
    }

    pub(crate) fn merge(&mut self, other: &PoolStats) {
        self.nodes += other.nodes;
        self.edges += other.edges;
        self.reserved_entries += other.reserved_entries;
        for class in &other.size_classes {
            match self
                .size_classes
                .iter_mut()
                .find(|c| c.slot_len == class.slot_len)
            {
                Some(existing) => {
                    existing.slots_in_use += class.slots_in_use;
                    existing.slots_released += class.slots_released;
                }
                None => self.size_classes.push(class.clone()),
            }
        }
        self.size_classes.sort_by_key(|c| c.slot_len);
    }
}

/// Adjacency storage for one direction of one segment.
///
/// Writers must be serialized by the caller (the owning segment holds a
/// writer lock); readers may call the read methods concurrently with that
/// writer.
pub trait EdgePool: Send + Sync {
    /// Appends `value` to `node`'s adjacency.
    fn add_edge(&self, node: u32, value: u32) -> Result<()>;

    /// Checks that `node` can take one more edge, returning the error
    /// `add_edge` would fail with otherwise. Writes nothing.
    fn check_add(&self, node: u32) -> Result<()>;

    /// Number of published edges for `node`; zero for unknown nodes.
    fn degree(&self, node: u32) -> usize;

    /// Appends `node`'s published edges, in insertion order, to `out`.
    fn read_into(&self, node: u32, out: &mut Vec<u32>);

    /// Highest node index seen plus one.
    fn node_count(&self) -> usize;

    /// Total number of published edges.
    fn edge_count(&self) -> usize;

    /// Freezes the pool; later `add_edge` calls fail with `Sealed`.
    fn seal(&self);

    /// Returns true once [`EdgePool::seal`] was called.
    fn is_sealed(&self) -> bool;

    /// Returns an occupancy summary.
    fn stats(&self) -> PoolStats;
}

/// Shared writer-side bookkeeping for node and edge counters.
pub(crate) fn bump_node_count(counter: &std::sync::atomic::AtomicUsize, node: u32) {
    use std::sync::atomic::Ordering;
    let wanted = node as usize + 1;
    if counter.load(Ordering::Relaxed) < wanted {
        counter.store(wanted, Ordering::Release);
    }
}
