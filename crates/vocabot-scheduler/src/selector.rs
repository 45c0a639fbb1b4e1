//! Review selection: weighted random sampling without replacement.
//!
//! Every candidate is weighted `1 / (1 + review_count)^1.5`, so rarely
//! reviewed words come up more often while heavily reviewed ones keep a
//! nonzero chance. The result always holds exactly `min(k, pool)` distinct
//! entries.
//!
//! Two samplers sit behind [`WeightedSampler`]:
//! - [`ReservoirSampler`]: Efraimidis–Spirakis A-Res, exact weighted sampling.
//! - [`TicketSampler`]: ticket multiset, draw, dedupe, shuffled backfill.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use vocabot_core::config::SamplerKind;
use vocabot_core::types::VocabEntry;

/// Floor for zero, negative and NaN weights.
const MIN_WEIGHT: f64 = 1e-12;

/// Tickets per unit of weight in [`TicketSampler`].
const TICKETS_PER_WEIGHT: f64 = 100.0;

/// Bounds the ticket multiset for weights far above 1.
const MAX_TICKETS_PER_ITEM: usize = 10_000;

/// Draws distinct indices from a weighted population.
pub trait WeightedSampler {
    fn name(&self) -> &'static str;

    /// Indices into `weights`, each at most once, exactly `min(k, weights.len())` of them,
    /// in draw order.
    fn draw_without_replacement<R: Rng + ?Sized>(
        &self,
        weights: &[f64],
        k: usize,
        rng: &mut R,
    ) -> Vec<usize>;
}

/// `+inf` is the heaviest possible weight, not an invalid one.
fn sanitize(weight: f64) -> f64 {
    if weight == f64::INFINITY {
        f64::MAX
    } else if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        MIN_WEIGHT
    }
}

/// Weighted reservoir sampling (A-Res) with keys kept in log space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReservoirSampler;

struct Keyed {
    key: f64,
    index: usize,
}

impl PartialEq for Keyed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Keyed {}

impl PartialOrd for Keyed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Keyed {
    // Reversed: the heap top is the smallest key, i.e. the first to evict.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.total_cmp(&self.key)
    }
}

impl WeightedSampler for ReservoirSampler {
    fn name(&self) -> &'static str {
        "reservoir"
    }

    fn draw_without_replacement<R: Rng + ?Sized>(
        &self,
        weights: &[f64],
        k: usize,
        rng: &mut R,
    ) -> Vec<usize> {
        let take = k.min(weights.len());
        if take == 0 {
            return Vec::new();
        }

        let mut reservoir: BinaryHeap<Keyed> = BinaryHeap::with_capacity(take + 1);
        for (index, w) in weights.iter().enumerate() {
            // ln(u^(1/w)) = ln(u) / w; same ordering, no underflow for small w.
            let u: f64 = rng.random();
            let key = u.ln() / sanitize(*w);
            if reservoir.len() < take {
                reservoir.push(Keyed { key, index });
            } else if reservoir.peek().is_some_and(|min| key > min.key) {
                reservoir.pop();
                reservoir.push(Keyed { key, index });
            }
        }

        // Ascending by reversed order = descending by key.
        reservoir
            .into_sorted_vec()
            .into_iter()
            .map(|k| k.index)
            .collect()
    }
}

/// Ticket approximation: each item holds `max(floor(w * 100), 1)` tickets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketSampler;

impl TicketSampler {
    pub fn ticket_count(weight: f64) -> usize {
        let tickets = (sanitize(weight) * TICKETS_PER_WEIGHT).floor();
        (tickets as usize).clamp(1, MAX_TICKETS_PER_ITEM)
    }
}

impl WeightedSampler for TicketSampler {
    fn name(&self) -> &'static str {
        "tickets"
    }

    fn draw_without_replacement<R: Rng + ?Sized>(
        &self,
        weights: &[f64],
        k: usize,
        rng: &mut R,
    ) -> Vec<usize> {
        let n = weights.len();
        let take = k.min(n);
        if take == 0 {
            return Vec::new();
        }

        let tickets: Vec<usize> = weights
            .iter()
            .enumerate()
            .flat_map(|(i, w)| std::iter::repeat_n(i, Self::ticket_count(*w)))
            .collect();

        // Every item holds at least one ticket, so tickets.len() >= n >= take.
        let mut seen = vec![false; n];
        let mut picked = Vec::with_capacity(take);
        for t in rand::seq::index::sample(rng, tickets.len(), take) {
            let i = tickets[t];
            if !seen[i] {
                seen[i] = true;
                picked.push(i);
            }
        }

        if picked.len() < take {
            let mut rest: Vec<usize> = (0..n).filter(|i| !seen[*i]).collect();
            rest.shuffle(rng);
            let missing = take - picked.len();
            picked.extend(rest.into_iter().take(missing));
        }
        picked
    }
}

/// Runtime choice between the samplers.
#[derive(Debug, Clone, Copy)]
pub enum AnySampler {
    Reservoir(ReservoirSampler),
    Tickets(TicketSampler),
}

impl AnySampler {
    pub fn from_kind(kind: SamplerKind) -> Self {
        match kind {
            SamplerKind::Reservoir => AnySampler::Reservoir(ReservoirSampler),
            SamplerKind::Tickets => AnySampler::Tickets(TicketSampler),
        }
    }
}

impl Default for AnySampler {
    fn default() -> Self {
        Self::from_kind(SamplerKind::default())
    }
}

impl WeightedSampler for AnySampler {
    fn name(&self) -> &'static str {
        match self {
            AnySampler::Reservoir(s) => s.name(),
            AnySampler::Tickets(s) => s.name(),
        }
    }

    fn draw_without_replacement<R: Rng + ?Sized>(
        &self,
        weights: &[f64],
        k: usize,
        rng: &mut R,
    ) -> Vec<usize> {
        match self {
            AnySampler::Reservoir(s) => s.draw_without_replacement(weights, k, rng),
            AnySampler::Tickets(s) => s.draw_without_replacement(weights, k, rng),
        }
    }
}

/// Pick up to `k` review candidates with the default sampler.
/// An empty pool yields an empty selection; the caller reports "nothing to review".
pub fn select_for_review(candidates: &[VocabEntry], k: usize) -> Vec<VocabEntry> {
    select_with(candidates, k, &AnySampler::default(), &mut rand::rng())
}

/// Pick up to `k` review candidates with an explicit sampler and RNG.
pub fn select_with<S, R>(
    candidates: &[VocabEntry],
    k: usize,
    sampler: &S,
    rng: &mut R,
) -> Vec<VocabEntry>
where
    S: WeightedSampler,
    R: Rng + ?Sized,
{
    // Ids are the only key; a repeated id keeps its first row.
    let mut ids = HashSet::with_capacity(candidates.len());
    let pool: Vec<&VocabEntry> = candidates.iter().filter(|e| ids.insert(e.id)).collect();
    if pool.len() < candidates.len() {
        tracing::warn!(
            "⚠️ Dropped {} duplicate review candidates",
            candidates.len() - pool.len()
        );
    }

    let weights: Vec<f64> = pool.iter().map(|e| e.review_weight()).collect();
    let picked = sampler.draw_without_replacement(&weights, k, rng);
    tracing::debug!(
        "🎲 {} sampler picked {}/{} candidates",
        sampler.name(),
        picked.len(),
        pool.len()
    );
    picked.into_iter().map(|i| pool[i].clone()).collect()
}
