//! Exact-fit repacking for sealed pools.

use super::{EdgePool, PoolStats};
use crate::error::{GraphError, Result};

/// Read-only adjacency with zero slack.
///
/// Every node's edges occupy one contiguous run of exactly `degree` entries
/// in a single array, in the order they were inserted into the source pool.
#[derive(Debug)]
pub struct OptimizedEdgePool {
    offsets: Vec<u32>,
    entries: Vec<u32>,
}

impl OptimizedEdgePool {
    #[inline]
    fn range(&self, node: u32) -> Option<(usize, usize)> {
        let node = node as usize;
        let start = *self.offsets.get(node)? as usize;
        let end = *self.offsets.get(node + 1)? as usize;
        Some((start, end))
    }
}

impl EdgePool for OptimizedEdgePool {
    fn add_edge(&self, _node: u32, _value: u32) -> Result<()> {
        Err(GraphError::Sealed("optimized edge pool".into()))
    }

    fn check_add(&self, _node: u32) -> Result<()> {
        Err(GraphError::Sealed("optimized edge pool".into()))
    }

    fn degree(&self, node: u32) -> usize {
        self.range(node).map(|(start, end)| end - start).unwrap_or(0)
    }

    fn read_into(&self, node: u32, out: &mut Vec<u32>) {
        if let Some((start, end)) = self.range(node) {
            out.extend_from_slice(&self.entries[start..end]);
        }
    }

    fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    fn edge_count(&self) -> usize {
        self.entries.len()
    }

    fn seal(&self) {}

    fn is_sealed(&self) -> bool {
        true
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            reserved_entries: self.entries.len(),
            size_classes: Vec::new(),
        }
    }
}

/// Offline repacking pass for sealed pools.
pub struct Optimizer;

impl Optimizer {
    /// Rebuilds `pool` into an [`OptimizedEdgePool`].
    ///
    /// Only sealed pools are accepted, which guarantees no writer races the
    /// copy. For every node the rebuilt pool returns exactly the sequence the
    /// source returned.
    pub fn optimize(pool: &dyn EdgePool) -> Result<OptimizedEdgePool> {
        if !pool.is_sealed() {
            return Err(GraphError::config("optimizer requires a sealed pool"));
        }
        let node_count = pool.node_count();
        let edge_count = pool.edge_count();
        if edge_count > u32::MAX as usize {
            return Err(GraphError::capacity("optimized entries", u64::from(u32::MAX)));
        }
        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut entries = Vec::with_capacity(edge_count);
        offsets.push(0);
        for node in 0..node_count as u32 {
            pool.read_into(node, &mut entries);
            offsets.push(entries.len() as u32);
        }
        entries.shrink_to_fit();
        Ok(OptimizedEdgePool { offsets, entries })
    }
}
