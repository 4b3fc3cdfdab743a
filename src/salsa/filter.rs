use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Per edge type, the seeds that contributed to a result.
pub type SocialProof = BTreeMap<u8, Vec<u64>>;

/// Decides whether a candidate is dropped from the results.
///
/// Closures of the shape `Fn(u64, &SocialProof) -> bool` implement this
/// trait directly.
pub trait ResultFilter: Send + Sync {
    /// Returns true to drop `candidate`.
    fn exclude(&self, candidate: u64, social_proof: &SocialProof) -> bool;
}

impl<F> ResultFilter for F
where
    F: Fn(u64, &SocialProof) -> bool + Send + Sync,
{
    fn exclude(&self, candidate: u64, social_proof: &SocialProof) -> bool {
        self(candidate, social_proof)
    }
}

/// Ordered filters combined with AND semantics: a candidate survives only
/// if every filter keeps it. The empty chain keeps everything.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ResultFilter>>,
}

impl FilterChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter.
    pub fn push(&mut self, filter: impl ResultFilter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    /// Appends an already shared filter.
    pub fn push_shared(&mut self, filter: Arc<dyn ResultFilter>) {
        self.filters.push(filter);
    }

    /// Builder-style [`Self::push`].
    pub fn with(mut self, filter: impl ResultFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if the chain excludes nothing.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns true if any filter excludes `candidate`. Stops at the first one that does.
    pub fn exclude(&self, candidate: u64, social_proof: &SocialProof) -> bool {
        self.filters
            .iter()
            .any(|filter| filter.exclude(candidate, social_proof))
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}
