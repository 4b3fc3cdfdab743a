//! Growable arrays whose elements never move.
//!
//! A fixed directory of lazily allocated chunks. The single writer
//! allocates chunks on demand through [`OnceLock::set`]; readers resolve an
//! element with one lock-free `get`. Because chunks are never reallocated,
//! a reference handed to a reader stays valid for the array's lifetime.

use std::sync::OnceLock;

use crate::error::{GraphError, Result};

pub(crate) struct ChunkedArray<A> {
    chunk_len: usize,
    chunks: Box<[OnceLock<Box<[A]>>]>,
}

impl<A: Default> ChunkedArray<A> {
    /// Creates an array able to hold `capacity` elements in chunks of `chunk_len`.
    pub(crate) fn new(capacity: usize, chunk_len: usize) -> Self {
        let chunk_len = chunk_len.max(1);
        let chunk_count = capacity.div_ceil(chunk_len);
        let chunks = (0..chunk_count).map(|_| OnceLock::new()).collect();
        Self { chunk_len, chunks }
    }

    /// Total number of addressable elements.
    pub(crate) fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_len
    }

    /// Returns the element at `index` if its chunk was allocated.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&A> {
        let chunk = self.chunks.get(index / self.chunk_len)?.get()?;
        chunk.get(index % self.chunk_len)
    }

    /// Returns the element at `index`, allocating its chunk first if needed.
    ///
    /// Writer-side only.
    pub(crate) fn ensure(&self, index: usize, what: &'static str) -> Result<&A> {
        let Some(cell) = self.chunks.get(index / self.chunk_len) else {
            return Err(GraphError::capacity(what, self.capacity() as u64));
        };
        let chunk = cell.get_or_init(|| (0..self.chunk_len).map(|_| A::default()).collect());
        chunk
            .get(index % self.chunk_len)
            .ok_or_else(|| GraphError::capacity(what, self.capacity() as u64))
    }

    /// Number of elements backed by allocated chunks.
    pub(crate) fn allocated_elements(&self) -> usize {
        self.chunks.iter().filter(|c| c.get().is_some()).count() * self.chunk_len
    }
}
