//! External id to dense internal index translation.
//!
//! Each segment side owns one [`NodeIndex`]. Internal indices are handed out
//! densely from zero and never reused, so adjacency pools can be plain arrays
//! addressed by index.
//!
//! # Concurrency
//!
//! One writer, any number of readers. The reverse array (index -> external id)
//! lives in a [`ChunkedArray`] and never moves. The forward hash table is an
//! open-addressed array of atomic slots; when its load factor passes one half
//! the writer builds a table of twice the size and swaps the published
//! [`Arc`]. Readers clone the `Arc` before probing, so a retired table is
//! freed only after the last in-flight probe drops it.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;
use tracing::debug;

use super::chunked::ChunkedArray;
use super::metrics::GraphMetrics;
use crate::error::{GraphError, Result};

const MIN_TABLE_CAPACITY: usize = 16;
const REVERSE_CHUNK_LEN: usize = 4096;

/// Slot value `0` marks an empty slot; occupied slots hold `internal + 1`.
struct Table {
    slots: Box<[AtomicU32]>,
    shift: u32,
}

impl Table {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(MIN_TABLE_CAPACITY);
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            shift: 64 - capacity.trailing_zeros(),
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn home(&self, external: u64) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write_u64(external);
        (hasher.finish() >> self.shift) as usize
    }

    /// Places `internal` in the first free slot of `external`'s probe chain.
    fn insert(&self, external: u64, internal: u32) {
        let mask = self.capacity() - 1;
        let mut pos = self.home(external);
        while self.slots[pos].load(Ordering::Relaxed) != 0 {
            pos = (pos + 1) & mask;
        }
        self.slots[pos].store(internal + 1, Ordering::Release);
    }
}

/// Bijective map between 64-bit external ids and dense 32-bit indices.
pub struct NodeIndex {
    table: RwLock<Arc<Table>>,
    reverse: ChunkedArray<AtomicU64>,
    len: AtomicUsize,
    max_nodes: usize,
    writer: Mutex<()>,
    metrics: Arc<dyn GraphMetrics>,
}

impl NodeIndex {
    /// Creates an index that accepts at most `max_nodes` distinct ids.
    pub fn new(
        initial_capacity: usize,
        max_nodes: usize,
        metrics: Arc<dyn GraphMetrics>,
    ) -> Result<Self> {
        if max_nodes == 0 || max_nodes > u32::MAX as usize {
            return Err(GraphError::config(format!(
                "max nodes {max_nodes} must be in 1..=u32::MAX"
            )));
        }
        let initial = initial_capacity.min(max_nodes).saturating_mul(2);
        Ok(Self {
            table: RwLock::new(Arc::new(Table::with_capacity(initial))),
            reverse: ChunkedArray::new(max_nodes, REVERSE_CHUNK_LEN.min(max_nodes)),
            len: AtomicUsize::new(0),
            max_nodes,
            writer: Mutex::new(()),
            metrics,
        })
    }

    /// Returns the number of mapped ids.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns true if no id was mapped yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured node bound.
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Returns the current slot count of the published hash table.
    pub fn capacity(&self) -> usize {
        self.table.read().capacity()
    }

    /// Looks up the internal index of `external`.
    pub fn lookup_internal(&self, external: u64) -> Option<u32> {
        let table = Arc::clone(&self.table.read());
        self.probe(&table, external)
    }

    /// Looks up the external id assigned to `internal`.
    pub fn lookup_external(&self, internal: u32) -> Option<u64> {
        let index = internal as usize;
        if index >= self.len() {
            return None;
        }
        self.reverse
            .get(index)
            .map(|cell| cell.load(Ordering::Relaxed))
    }

    /// Returns the index of `external`, assigning the next free index on first sight.
    pub fn get_or_create(&self, external: u64) -> Result<u32> {
        let _writer = self.writer.lock();
        let table = Arc::clone(&self.table.read());
        if let Some(existing) = self.probe(&table, external) {
            return Ok(existing);
        }
        let next = self.len.load(Ordering::Relaxed);
        if next >= self.max_nodes {
            return Err(GraphError::capacity("nodes", self.max_nodes as u64));
        }
        self.reverse
            .ensure(next, "nodes")?
            .store(external, Ordering::Relaxed);
        let internal = next as u32;
        if (next + 1) * 2 > table.capacity() {
            self.grow(table.capacity() * 2, next + 1);
        } else {
            table.insert(external, internal);
        }
        self.len.store(next + 1, Ordering::Release);
        Ok(internal)
    }

    /// Returns true if `external` would be accepted by [`Self::get_or_create`].
    pub fn can_accept(&self, external: u64) -> bool {
        self.len() < self.max_nodes || self.lookup_internal(external).is_some()
    }

    /// Rebuilds the table at `capacity` holding indices `0..count`, then publishes it.
    fn grow(&self, capacity: usize, count: usize) {
        let next = Table::with_capacity(capacity);
        for internal in 0..count {
            if let Some(cell) = self.reverse.get(internal) {
                next.insert(cell.load(Ordering::Relaxed), internal as u32);
            }
        }
        let new_capacity = next.capacity();
        *self.table.write() = Arc::new(next);
        debug!(capacity = new_capacity, nodes = count, "node_index.grow");
        self.metrics.node_index_grown(new_capacity);
    }

    fn probe(&self, table: &Table, external: u64) -> Option<u32> {
        let mask = table.capacity() - 1;
        let mut pos = table.home(external);
        loop {
            let slot = table.slots[pos].load(Ordering::Acquire);
            if slot == 0 {
                return None;
            }
            let internal = slot - 1;
            let stored = self.reverse.get(internal as usize)?;
            if stored.load(Ordering::Relaxed) == external {
                return Some(internal);
            }
            pos = (pos + 1) & mask;
        }
    }
}
