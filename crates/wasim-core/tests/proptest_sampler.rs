//! Property-based tests for the weighted sampler and histogram.
//!
//! Verifies:
//! - Sampled index always carries nonzero weight
//! - `locate` agrees with a brute-force prefix-sum search
//! - Draws beyond the total resolve to nothing
//! - Determinism: same seed produces the same index sequence
//! - Slice and iterator sampling consume the generator identically
//! - Histogram moves conserve population

use proptest::prelude::*;

use wasim_core::histogram::Histogram;
use wasim_core::sampler::{WeightedSampler, locate};

// ────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────

/// Weight vectors with at least one nonzero entry.
fn arb_weights() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(prop_oneof![3 => Just(0u64), 7 => 0u64..1_000], 1..40)
        .prop_filter("needs positive total", |w| w.iter().sum::<u64>() > 0)
}

fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn brute_force(weights: &[u64], r: u64) -> Option<usize> {
    let mut prefix = 0;
    for (i, &w) in weights.iter().enumerate() {
        if r >= prefix && r < prefix + w {
            return Some(i);
        }
        prefix += w;
    }
    None
}

// ────────────────────────────────────────────────────────────────────
// locate
// ────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every draw below the total lands on the bucket whose prefix range holds it.
    #[test]
    fn prop_locate_matches_prefix_search(
        weights in arb_weights(),
        frac in 0.0f64..1.0,
    ) {
        let total: u64 = weights.iter().sum();
        let r = ((total as f64 * frac) as u64).min(total - 1);
        let idx = locate(weights.iter().copied(), r);
        prop_assert_eq!(idx, brute_force(&weights, r));
        prop_assert!(idx.is_some());
        prop_assert!(weights[idx.unwrap()] > 0, "zero-weight bucket selected");
    }

    /// Draws at or past the total never resolve.
    #[test]
    fn prop_locate_past_total_is_none(
        weights in arb_weights(),
        extra in 0u64..100,
    ) {
        let total: u64 = weights.iter().sum();
        prop_assert_eq!(locate(weights.iter().copied(), total + extra), None);
    }
}

// ────────────────────────────────────────────────────────────────────
// WeightedSampler
// ────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Sampled indices are in range and never zero-weight.
    #[test]
    fn prop_sample_hits_nonzero_weight(
        weights in arb_weights(),
        seed in arb_seed(),
    ) {
        let total: u64 = weights.iter().sum();
        let mut sampler = WeightedSampler::with_seed(seed);
        for _ in 0..50 {
            let idx = sampler.sample(&weights, total);
            prop_assert!(idx < weights.len());
            prop_assert!(weights[idx] > 0);
        }
        prop_assert_eq!(sampler.draws(), 50);
    }

    /// Two samplers with the same seed agree, and slice/iterator paths agree.
    #[test]
    fn prop_same_seed_same_sequence(
        weights in arb_weights(),
        seed in arb_seed(),
    ) {
        let total: u64 = weights.iter().sum();
        let mut a = WeightedSampler::with_seed(seed);
        let mut b = WeightedSampler::with_seed(seed);
        for _ in 0..30 {
            let x = a.sample(&weights, total);
            let y = b.sample_iter(weights.iter().copied(), total);
            prop_assert_eq!(x, y);
        }
    }
}

// ────────────────────────────────────────────────────────────────────
// Histogram
// ────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any sequence of legal moves keeps the population and recount in sync.
    #[test]
    fn prop_moves_conserve_population(
        buckets in 2usize..20,
        population in 1u64..200,
        moves in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..100),
    ) {
        let mut h = Histogram::concentrated(buckets, 0, population);
        for (from, to) in moves {
            let occupied: Vec<usize> = (0..buckets).filter(|&i| h.get(i) > 0).collect();
            let from = occupied[from.index(occupied.len())];
            let to = to.index(buckets);
            h.move_one(from, to);
            prop_assert_eq!(h.counts().iter().sum::<u64>(), population);
        }
        prop_assert!(h.check_population().is_ok());
        prop_assert_eq!(h.population(), population);
        prop_assert_eq!(h.snapshot().len(), buckets);
    }
}
