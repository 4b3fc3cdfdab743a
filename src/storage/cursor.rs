use super::graph::Side;

/// One adjacency entry as seen by a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// External id of the node on the other side.
    pub node: u64,
    /// Edge type tag.
    pub edge_type: u8,
    /// Latest engagement time recorded in the segment holding this edge.
    pub engaged_at: i64,
}

/// Restartable, reusable sequence of neighbors.
///
/// Graph readers fill the cursor in place, so one cursor can serve many
/// lookups without reallocating. Iterating consumes nothing: [`restart`]
/// rewinds to the first neighbor.
///
/// [`restart`]: NeighborCursor::restart
#[derive(Debug, Default)]
pub struct NeighborCursor {
    neighbors: Vec<Neighbor>,
    index: usize,
    pub(crate) scratch: Vec<u32>,
    pub(crate) side: Option<Side>,
}

impl NeighborCursor {
    /// Creates an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cursor with room for `capacity` neighbors.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            neighbors: Vec::with_capacity(capacity),
            scratch: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Rewinds iteration to the first neighbor.
    pub fn restart(&mut self) {
        self.index = 0;
    }

    /// Number of neighbors loaded.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Returns true if the last lookup found nothing.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Returns the loaded neighbors.
    pub fn as_slice(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// Returns the neighbor at `index`.
    pub fn get(&self, index: usize) -> Option<&Neighbor> {
        self.neighbors.get(index)
    }

    /// Side of the node whose neighbors are loaded.
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub(crate) fn reset(&mut self, side: Side) {
        self.neighbors.clear();
        self.scratch.clear();
        self.index = 0;
        self.side = Some(side);
    }

    pub(crate) fn push(&mut self, neighbor: Neighbor) {
        self.neighbors.push(neighbor);
    }
}

impl Iterator for NeighborCursor {
    type Item = Neighbor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.neighbors.len() {
            return None;
        }
        let item = self.neighbors[self.index];
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.neighbors.len() - self.index;
        (remaining, Some(remaining))
    }
}
