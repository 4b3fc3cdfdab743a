//! Power-of-two size-class adjacency pool.
//!
//! Node degrees in engagement graphs follow a power law: most nodes have a
//! handful of edges while a few have millions. Size class `k` holds slots of
//! `2^(min_bits + k)` entries; a node lives in the smallest class that fits
//! its degree and is promoted one class up when its slot fills.
//!
//! A node is addressed only through a [`SlotHandle`] stored in an atomic, so
//! promotion swaps the handle and nobody keeps a raw slot reference.
//!
//! # Reclaiming promoted slots
//!
//! A promoted node's old slot may still be read by a reader that loaded the
//! previous handle. Released slots are parked on a retire list and moved to
//! the free list only when the pool observes zero active read guards. The
//! handle store and the reader-count load are both `SeqCst`, so a reader that
//! registers after that check can only load the new handle.
//!
//! # Slot budget
//!
//! Class 0 has one slot per node. Higher classes share `4 * max_edges`
//! entries each: a node in class `k > 0` fills more than half its slot, so
//! live slots never need more than half of that. A class runs dry only
//! while retired slots are pinned by readers, and [`EdgePool::check_add`]
//! reports that before anything is written.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{bump_node_count, EdgePool, PoolStats, SizeClassStats};
use crate::error::{GraphError, Result};
use crate::storage::chunked::ChunkedArray;
use crate::storage::metrics::GraphMetrics;

const TARGET_CHUNK_ENTRIES: usize = 4096;
const NODE_CHUNK_LEN: usize = 4096;
/// Largest accepted `min_class_bits`.
pub const MAX_MIN_CLASS_BITS: u32 = 16;

/// Stable address of a node's slot: size class plus slot number.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SlotHandle {
    /// Size class, `0` being the smallest.
    pub size_class: u8,
    /// Slot number within the class.
    pub slot: u32,
}

impl SlotHandle {
    /// Packs the handle; `0` is reserved for "no slot".
    #[inline]
    fn pack(self) -> u64 {
        ((u64::from(self.size_class) + 1) << 32) | u64::from(self.slot)
    }

    #[inline]
    fn unpack(raw: u64) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        Some(Self {
            size_class: ((raw >> 32) - 1) as u8,
            slot: raw as u32,
        })
    }
}

struct SizeClass {
    slot_len: usize,
    max_slots: usize,
    entries: ChunkedArray<AtomicU32>,
}

impl SizeClass {
    #[inline]
    fn entry(&self, slot: u32, offset: usize) -> Option<&AtomicU32> {
        self.entries.get(slot as usize * self.slot_len + offset)
    }
}

#[derive(Default)]
struct WriterState {
    next_slot: Vec<u32>,
    free: Vec<Vec<u32>>,
    retired: Vec<SlotHandle>,
}

/// Decrements the active-reader count on drop.
struct ReadGuard<'a> {
    readers: &'a AtomicUsize,
}

impl<'a> ReadGuard<'a> {
    fn enter(readers: &'a AtomicUsize) -> Self {
        readers.fetch_add(1, Ordering::SeqCst);
        Self { readers }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Adjacency pool with power-of-two size classes and slot promotion.
pub struct PowerLawEdgePool {
    min_class_bits: u32,
    max_degree: usize,
    classes: Vec<SizeClass>,
    handles: ChunkedArray<AtomicU64>,
    lengths: ChunkedArray<AtomicU32>,
    nodes: AtomicUsize,
    edges: AtomicUsize,
    readers: AtomicUsize,
    sealed: AtomicBool,
    writer: Mutex<WriterState>,
    metrics: Arc<dyn GraphMetrics>,
}

impl PowerLawEdgePool {
    /// Creates a pool for `max_nodes` nodes holding up to `max_edges` edges.
    ///
    /// The smallest class holds `2^min_class_bits` entries; the largest is
    /// the first class whose slot fits `max_degree`.
    pub fn new(
        max_nodes: usize,
        max_edges: usize,
        max_degree: usize,
        min_class_bits: u32,
        metrics: Arc<dyn GraphMetrics>,
    ) -> Result<Self> {
        if max_nodes == 0 || max_edges == 0 || max_degree == 0 {
            return Err(GraphError::config(
                "power-law pool needs non-zero node, edge and degree bounds",
            ));
        }
        if min_class_bits > MAX_MIN_CLASS_BITS {
            return Err(GraphError::config(format!(
                "minimum size class 2^{min_class_bits} exceeds 2^{MAX_MIN_CLASS_BITS}"
            )));
        }
        let top_bits = (max_degree.next_power_of_two().trailing_zeros()).max(min_class_bits);
        let class_count = (top_bits - min_class_bits + 1) as usize;
        if class_count > u8::MAX as usize {
            return Err(GraphError::config("too many size classes"));
        }
        let shared_capacity = max_edges.saturating_mul(4);
        let classes = (0..class_count)
            .map(|k| {
                let slot_len = 1usize << (min_class_bits as usize + k);
                let max_slots = if k == 0 {
                    max_nodes
                } else {
                    (shared_capacity / slot_len).max(1)
                };
                let chunk_len = slot_len.max(TARGET_CHUNK_ENTRIES);
                SizeClass {
                    slot_len,
                    max_slots,
                    entries: ChunkedArray::new(max_slots.saturating_mul(slot_len), chunk_len),
                }
            })
            .collect();
        Ok(Self {
            min_class_bits,
            max_degree,
            classes,
            handles: ChunkedArray::new(max_nodes, NODE_CHUNK_LEN.min(max_nodes)),
            lengths: ChunkedArray::new(max_nodes, NODE_CHUNK_LEN.min(max_nodes)),
            nodes: AtomicUsize::new(0),
            edges: AtomicUsize::new(0),
            readers: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
            writer: Mutex::new(WriterState {
                next_slot: vec![0; class_count],
                free: vec![Vec::new(); class_count],
                retired: Vec::new(),
            }),
            metrics,
        })
    }

    /// Number of size classes.
    pub fn size_class_count(&self) -> usize {
        self.classes.len()
    }

    /// Entries per slot in `size_class`.
    pub fn slot_len(&self, size_class: u8) -> Option<usize> {
        self.classes.get(size_class as usize).map(|c| c.slot_len)
    }

    /// Returns the current slot handle of `node`, if it owns one.
    pub fn handle(&self, node: u32) -> Option<SlotHandle> {
        self.handles
            .get(node as usize)
            .and_then(|h| SlotHandle::unpack(h.load(Ordering::SeqCst)))
    }

    /// Smallest size class whose slot holds `degree` entries.
    pub fn size_class_for(&self, degree: usize) -> Option<u8> {
        self.classes
            .iter()
            .position(|c| c.slot_len >= degree)
            .map(|k| k as u8)
    }

    fn slot_available(&self, state: &WriterState, size_class: u8) -> bool {
        let k = size_class as usize;
        !state.free[k].is_empty() || (state.next_slot[k] as usize) < self.classes[k].max_slots
    }

    fn slots_exhausted(&self, size_class: u8) -> GraphError {
        let class = &self.classes[size_class as usize];
        GraphError::capacity("pool entries", (class.max_slots * class.slot_len) as u64)
    }

    /// Size class the next edge of `node` lands in, or `None` if its current
    /// slot still has room.
    fn next_class(&self, node: u32, len: usize) -> Result<Option<u8>> {
        let size_class = match self.handle(node) {
            None => 0,
            Some(handle) if len < self.classes[handle.size_class as usize].slot_len => {
                return Ok(None)
            }
            Some(handle) => handle.size_class + 1,
        };
        if size_class as usize >= self.classes.len() {
            return Err(GraphError::capacity("degree", self.max_degree as u64));
        }
        Ok(Some(size_class))
    }

    fn allocate(&self, state: &mut WriterState, size_class: u8) -> Result<u32> {
        let k = size_class as usize;
        if let Some(slot) = state.free[k].pop() {
            return Ok(slot);
        }
        if !self.slot_available(state, size_class) {
            return Err(self.slots_exhausted(size_class));
        }
        let class = &self.classes[k];
        let slot = state.next_slot[k];
        let start = slot as usize * class.slot_len;
        // Touch both ends so the slot's chunk exists before anyone can see it.
        class.entries.ensure(start, "pool entries")?;
        class
            .entries
            .ensure(start + class.slot_len - 1, "pool entries")?;
        state.next_slot[k] = slot + 1;
        Ok(slot)
    }

    fn reclaim(&self, state: &mut WriterState) {
        if state.retired.is_empty() || self.readers.load(Ordering::SeqCst) != 0 {
            return;
        }
        for handle in state.retired.drain(..) {
            state.free[handle.size_class as usize].push(handle.slot);
        }
    }

    fn store_entry(&self, handle: SlotHandle, offset: usize, value: u32) -> Result<()> {
        self.classes[handle.size_class as usize]
            .entry(handle.slot, offset)
            .ok_or_else(|| GraphError::capacity("pool entries", offset as u64))?
            .store(value, Ordering::Relaxed);
        Ok(())
    }
}

impl EdgePool for PowerLawEdgePool {
    fn add_edge(&self, node: u32, value: u32) -> Result<()> {
        if self.is_sealed() {
            return Err(GraphError::Sealed("power-law edge pool".into()));
        }
        let mut state = self.writer.lock();
        let length = self.lengths.ensure(node as usize, "nodes")?;
        let len = length.load(Ordering::Relaxed) as usize;
        if len >= self.max_degree {
            return Err(GraphError::capacity("degree", self.max_degree as u64));
        }
        let handle_cell = self.handles.ensure(node as usize, "nodes")?;
        match SlotHandle::unpack(handle_cell.load(Ordering::Relaxed)) {
            None => {
                let handle = SlotHandle {
                    size_class: 0,
                    slot: self.allocate(&mut state, 0)?,
                };
                self.store_entry(handle, 0, value)?;
                handle_cell.store(handle.pack(), Ordering::SeqCst);
            }
            Some(handle) if len < self.classes[handle.size_class as usize].slot_len => {
                self.store_entry(handle, len, value)?;
            }
            Some(old) => {
                let size_class = old.size_class + 1;
                if size_class as usize >= self.classes.len() {
                    return Err(GraphError::capacity("degree", self.max_degree as u64));
                }
                let promoted = SlotHandle {
                    size_class,
                    slot: self.allocate(&mut state, size_class)?,
                };
                let from = &self.classes[old.size_class as usize];
                for offset in 0..len {
                    let moved = from
                        .entry(old.slot, offset)
                        .map(|e| e.load(Ordering::Relaxed))
                        .unwrap_or_default();
                    self.store_entry(promoted, offset, moved)?;
                }
                self.store_entry(promoted, len, value)?;
                handle_cell.store(promoted.pack(), Ordering::SeqCst);
                state.retired.push(old);
                self.metrics.pool_promotion();
                trace!(
                    node,
                    from = old.size_class,
                    to = size_class,
                    degree = len + 1,
                    "pool.promote"
                );
            }
        }
        length.store(len as u32 + 1, Ordering::Release);
        bump_node_count(&self.nodes, node);
        self.edges.fetch_add(1, Ordering::Release);
        self.reclaim(&mut state);
        Ok(())
    }

    fn check_add(&self, node: u32) -> Result<()> {
        if self.is_sealed() {
            return Err(GraphError::Sealed("power-law edge pool".into()));
        }
        let len = self.degree(node);
        if len >= self.max_degree {
            return Err(GraphError::capacity("degree", self.max_degree as u64));
        }
        let Some(size_class) = self.next_class(node, len)? else {
            return Ok(());
        };
        let mut state = self.writer.lock();
        self.reclaim(&mut state);
        if self.slot_available(&state, size_class) {
            Ok(())
        } else {
            Err(self.slots_exhausted(size_class))
        }
    }

    fn degree(&self, node: u32) -> usize {
        self.lengths
            .get(node as usize)
            .map(|len| len.load(Ordering::Acquire) as usize)
            .unwrap_or(0)
    }

    fn read_into(&self, node: u32, out: &mut Vec<u32>) {
        let _guard = ReadGuard::enter(&self.readers);
        // Length first: the handle loaded afterwards is at least as new as the
        // one that was current when this length was published.
        let len = self.degree(node);
        if len == 0 {
            return;
        }
        let Some(handle) = self.handle(node) else {
            return;
        };
        let class = &self.classes[handle.size_class as usize];
        out.reserve(len);
        for offset in 0..len.min(class.slot_len) {
            if let Some(entry) = class.entry(handle.slot, offset) {
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
        let state = self.writer.lock();
        let mut size_classes: Vec<SizeClassStats> = self
            .classes
            .iter()
            .enumerate()
            .map(|(k, class)| SizeClassStats {
                slot_len: class.slot_len,
                slots_in_use: state.next_slot[k] as usize - state.free[k].len(),
                slots_released: state.free[k].len(),
            })
            .collect();
        for handle in &state.retired {
            let class = &mut size_classes[handle.size_class as usize];
            class.slots_in_use -= 1;
            class.slots_released += 1;
        }
        let reserved_entries = size_classes
            .iter()
            .map(|c| c.slots_in_use * c.slot_len)
            .sum();
        PoolStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            reserved_entries,
            size_classes,
        }
    }
}

impl std::fmt::Debug for PowerLawEdgePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerLawEdgePool")
            .field("min_class_bits", &self.min_class_bits)
            .field("size_classes", &self.classes.len())
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
