use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sink for store and query counters.
///
/// Implementations are injected through [`super::GraphOptions::metrics`] and
/// shared by every segment and query; they must be cheap and thread-safe.
pub trait GraphMetrics: Send + Sync {
    /// Records an accepted edge.
    fn edge_added(&self);

    /// Records an edge rejected by a capacity or encoding check.
    fn edge_rejected(&self);

    /// Records a segment reaching capacity and becoming read-only.
    fn segment_sealed(&self);

    /// Records the oldest segment leaving the retention window.
    fn segment_evicted(&self);

    /// Records a sealed segment being repacked by the optimizer.
    ///
    /// # Parameters
    /// * `reclaimed_entries` - Slack entries freed by the exact-fit rebuild.
    fn segment_optimized(&self, reclaimed_entries: u64);

    /// Records a node index table being rebuilt at a larger capacity.
    fn node_index_grown(&self, new_capacity: usize);

    /// Records a power-law slot promotion into a larger size class.
    fn pool_promotion(&self);

    /// Records a completed SALSA query.
    ///
    /// # Parameters
    /// * `elapsed` - Wall time spent walking and ranking.
    /// * `visited_right` - Number of distinct right nodes that received mass.
    fn salsa_completed(&self, elapsed: Duration, visited_right: usize);
}

/// A [`GraphMetrics`] implementation that discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl GraphMetrics for NoopMetrics {
    fn edge_added(&self) {}
    fn edge_rejected(&self) {}
    fn segment_sealed(&self) {}
    fn segment_evicted(&self) {}
    fn segment_optimized(&self, _reclaimed_entries: u64) {}
    fn node_index_grown(&self, _new_capacity: usize) {}
    fn pool_promotion(&self) {}
    fn salsa_completed(&self, _elapsed: Duration, _visited_right: usize) {}
}

/// A thread-safe counter-based implementation of [`GraphMetrics`].
///
/// All counters use relaxed atomics; readers get eventually consistent
/// totals, which is all the counters are used for.
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of edges accepted.
    pub edges_added: AtomicU64,

    /// Number of edges rejected at insertion.
    pub edges_rejected: AtomicU64,

    /// Number of segments sealed.
    pub segments_sealed: AtomicU64,

    /// Number of segments evicted from the window.
    pub segments_evicted: AtomicU64,

    /// Number of segments rebuilt by the optimizer.
    pub segments_optimized: AtomicU64,

    /// Total slack entries reclaimed by the optimizer.
    pub optimizer_reclaimed_entries: AtomicU64,

    /// Number of node index table rebuilds.
    pub node_index_growths: AtomicU64,

    /// Number of power-law slot promotions.
    pub pool_promotions: AtomicU64,

    /// Number of completed SALSA queries.
    pub salsa_queries: AtomicU64,

    /// Accumulated SALSA wall time in microseconds.
    pub salsa_micros: AtomicU64,

    /// Accumulated count of visited right nodes across queries.
    pub salsa_visited_right: AtomicU64,
}

impl GraphMetrics for CounterMetrics {
    fn edge_added(&self) {
        self.edges_added.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_rejected(&self) {
        self.edges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_sealed(&self) {
        self.segments_sealed.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_evicted(&self) {
        self.segments_evicted.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_optimized(&self, reclaimed_entries: u64) {
        self.segments_optimized.fetch_add(1, Ordering::Relaxed);
        self.optimizer_reclaimed_entries
            .fetch_add(reclaimed_entries, Ordering::Relaxed);
    }

    fn node_index_grown(&self, _new_capacity: usize) {
        self.node_index_growths.fetch_add(1, Ordering::Relaxed);
    }

    fn pool_promotion(&self) {
        self.pool_promotions.fetch_add(1, Ordering::Relaxed);
    }

    fn salsa_completed(&self, elapsed: Duration, visited_right: usize) {
        self.salsa_queries.fetch_add(1, Ordering::Relaxed);
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.salsa_micros.fetch_add(micros, Ordering::Relaxed);
        self.salsa_visited_right
            .fetch_add(visited_right as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn GraphMetrics> {
    Arc::new(NoopMetrics)
}
