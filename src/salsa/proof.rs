//! Per-result social proof bookkeeping.

use std::cmp::Ordering;

use smallvec::SmallVec;

use super::filter::SocialProof;

#[derive(Clone, Debug)]
struct Contribution {
    seed: u64,
    weight: f64,
    engaged_at: i64,
}

#[derive(Clone, Debug)]
struct TypeProof {
    edge_type: u8,
    total: f64,
    seeds: SmallVec<[Contribution; 4]>,
}

/// Seeds and edge types that sent mass to one right node.
///
/// At most `max_types` distinct edge types are tracked, in the order they
/// were first seen; later types are dropped. [`Self::finalize`] then orders
/// and truncates for presentation.
#[derive(Clone, Debug, Default)]
pub struct ProofAccumulator {
    types: SmallVec<[TypeProof; 2]>,
}

impl ProofAccumulator {
    /// Records `weight` arriving from `seed` over an edge of `edge_type`.
    ///
    /// Returns false if the type was dropped because `max_types` distinct
    /// types are already tracked.
    pub fn record(
        &mut self,
        edge_type: u8,
        seed: u64,
        weight: f64,
        engaged_at: i64,
        max_types: usize,
    ) -> bool {
        let position = match self.types.iter().position(|t| t.edge_type == edge_type) {
            Some(position) => position,
            None if self.types.len() >= max_types => return false,
            None => {
                self.types.push(TypeProof {
                    edge_type,
                    total: 0.0,
                    seeds: SmallVec::new(),
                });
                self.types.len() - 1
            }
        };
        let entry = &mut self.types[position];
        entry.total += weight;
        match entry.seeds.iter_mut().find(|c| c.seed == seed) {
            Some(contribution) => {
                contribution.weight += weight;
                contribution.engaged_at = contribution.engaged_at.max(engaged_at);
            }
            None => entry.seeds.push(Contribution {
                seed,
                weight,
                engaged_at,
            }),
        }
        true
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Orders and truncates the proof.
    ///
    /// Types are ordered by total contribution, largest first, ties by type
    /// tag; at most `max_types` are kept. Within a type, seeds are ordered by
    /// contribution, then most recent engagement, then smallest seed id, and
    /// at most `max_seeds` are kept.
    pub fn finalize(&self, max_types: usize, max_seeds: usize) -> SocialProof {
        let mut types: SmallVec<[&TypeProof; 4]> = self.types.iter().collect();
        types.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.edge_type.cmp(&b.edge_type))
        });
        types
            .into_iter()
            .take(max_types)
            .map(|proof| {
                let mut seeds: SmallVec<[&Contribution; 8]> = proof.seeds.iter().collect();
                seeds.sort_by(|a, b| compare_contributions(a, b));
                let seeds = seeds.into_iter().take(max_seeds).map(|c| c.seed).collect();
                (proof.edge_type, seeds)
            })
            .collect()
    }
}

fn compare_contributions(a: &Contribution, b: &Contribution) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| b.engaged_at.cmp(&a.engaged_at))
        .then_with(|| a.seed.cmp(&b.seed))
}

/// Number of distinct seeds across all types of a finalized proof.
pub fn contributing_seeds(proof: &SocialProof) -> usize {
    let mut seeds: SmallVec<[u64; 16]> = proof.values().flatten().copied().collect();
    seeds.sort_unstable();
    seeds.dedup();
    seeds.len()
}
