use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use super::{bump_node_count, EdgePool, PoolStats};
use crate::error::{GraphError, Result};
use crate::storage::chunked::ChunkedArray;

const TARGET_CHUNK_ENTRIES: usize = 4096;

/// Fixed-capacity adjacency: every node owns a `max_degree` slot.
pub struct UniformEdgePool {
    max_degree: usize,
    entries: ChunkedArray<AtomicU32>,
    lengths: ChunkedArray<AtomicU32>,
    nodes: AtomicUsize,
    edges: AtomicUsize,
    sealed: AtomicBool,
}

impl UniformEdgePool {
    /// Creates a pool for up to `max_nodes` nodes of at most `max_degree` edges.
    pub fn new(max_nodes: usize, max_degree: usize) -> Result<Self> {
        if max_nodes == 0 || max_degree == 0 {
            return Err(GraphError::config(
                "uniform pool needs non-zero node and degree bounds",
            ));
        }
        let Some(capacity) = max_nodes.checked_mul(max_degree) else {
            return Err(GraphError::config("uniform pool capacity overflows usize"));
        };
        let slots_per_chunk = (TARGET_CHUNK_ENTRIES / max_degree).max(1);
        Ok(Self {
            max_degree,
            entries: ChunkedArray::new(capacity, slots_per_chunk * max_degree),
            lengths: ChunkedArray::new(max_nodes, TARGET_CHUNK_ENTRIES.min(max_nodes)),
            nodes: AtomicUsize::new(0),
            edges: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
        })
    }

    /// Per-node degree bound.
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }
}

impl EdgePool for UniformEdgePool {
    fn add_edge(&self, node: u32, value: u32) -> Result<()> {
        if self.is_sealed() {
            return Err(GraphError::Sealed("uniform edge pool".into()));
        }
        let length = self.lengths.ensure(node as usize, "nodes")?;
        let len = length.load(Ordering::Relaxed) as usize;
        if len >= self.max_degree {
            return Err(GraphError::capacity("degree", self.max_degree as u64));
        }
        let base = node as usize * self.max_degree;
        self.entries
            .ensure(base + len, "pool entries")?
            .store(value, Ordering::Relaxed);
        length.store(len as u32 + 1, Ordering::Release);
        bump_node_count(&self.nodes, node);
        self.edges.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn check_add(&self, node: u32) -> Result<()> {
        if self.is_sealed() {
            return Err(GraphError::Sealed("uniform edge pool".into()));
        }
        if self.degree(node) >= self.max_degree {
            return Err(GraphError::capacity("degree", self.max_degree as u64));
        }
        Ok(())
    }

    fn degree(&self, node: u32) -> usize {
        self.lengths
            .get(node as usize)
            .map(|len| len.load(Ordering::Acquire) as usize)
            .unwrap_or(0)
    }

    fn read_into(&self, node: u32, out: &mut Vec<u32>) {
        let len = self.degree(node);
        let base = node as usize * self.max_degree;
        out.reserve(len);
        for offset in 0..len {
            if let Some(entry) = self.entries.get(base + offset) {
                out.push(entry.load(Ordering::Relaxed));
            }
        }
    }

    fn node_count(&self) -> usize {
        self.nodes.load(Ordering::Acquire)
    }

    fn edge_count(&self) -> usize {
        self.edges.load(Ordering::Acquire)
    }

    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn stats(&self) -> PoolStats {
        let nodes = self.node_count();
        PoolStats {
            nodes,
            edges: self.edge_count(),
            reserved_entries: nodes * self.max_degree,
            size_classes: Vec::new(),
        }
    }
}
