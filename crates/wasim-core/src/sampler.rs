//! Weighted random index sampling over discrete histograms.
//!
//! Both models resolve "which bucket does this simulated event touch" the same
//! way: draw a uniform `r` in `[0, total)` and walk the weights left to right,
//! returning the first index whose running sum exceeds `r`. The walk is
//! O(buckets), which is cheap next to the size of the population being
//! modelled (millions of candidates or blocks collapse into a few thousand
//! buckets at most).
//!
//! # Contract
//!
//! - `total` must equal the sum of the weights.
//! - `0 < total < 2^32`, so the draw fits an unbiased 32-bit uniform range.
//!
//! Breaking either is a programming defect and aborts through
//! [`invariant::fatal`](crate::invariant::fatal); the sampler never returns a
//! sentinel index.
//!
//! # Determinism
//!
//! [`WeightedSampler`] owns its generator. Two samplers built with the same
//! seed produce the same index sequence for the same weight sequence, which is
//! what makes model runs reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::invariant::{InvariantViolation, fatal};

/// Exclusive upper bound on a sampled population.
pub const MAX_TOTAL: u64 = 1 << 32;

/// A seeded weighted-index sampler.
///
/// # Example
///
/// ```ignore
/// let mut sampler = WeightedSampler::with_seed(7);
/// let idx = sampler.sample(&[0, 0, 5, 0], 5);
/// assert_eq!(idx, 2);
/// ```
pub struct WeightedSampler<R = StdRng> {
    rng: R,
    draws: u64,
}

impl WeightedSampler<StdRng> {
    /// Create a sampler backed by a `StdRng` seeded from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> WeightedSampler<R> {
    /// Wrap an existing generator.
    #[must_use]
    pub fn from_rng(rng: R) -> Self {
        Self { rng, draws: 0 }
    }

    /// Draw an index from `weights` with probability proportional to weight.
    ///
    /// Verifies `Σ weights == total` before drawing.
    pub fn sample(&mut self, weights: &[u64], total: u64) -> usize {
        let actual = weights
            .iter()
            .fold(0u64, |acc, &w| acc.saturating_add(w));
        if actual != total {
            fatal(InvariantViolation::WeightTotalMismatch {
                expected: total,
                actual,
            });
        }
        self.sample_iter(weights.iter().copied(), total)
    }

    /// Draw an index from a lazily produced weight sequence.
    ///
    /// For callers that maintain `total` incrementally. The sum is not
    /// recomputed up front; a walk that runs out of weight before reaching
    /// the draw is reported as a total mismatch.
    pub fn sample_iter<I>(&mut self, weights: I, total: u64) -> usize
    where
        I: IntoIterator<Item = u64>,
    {
        let r = self.draw(total);
        match walk(weights, r) {
            Ok(index) => index,
            Err(actual) => fatal(InvariantViolation::WeightTotalMismatch {
                expected: total,
                actual,
            }),
        }
    }

    /// Uniform draw in `[0, total)`.
    pub fn draw(&mut self, total: u64) -> u64 {
        if total == 0 {
            fatal(InvariantViolation::EmptyPopulation);
        }
        let Ok(bound) = u32::try_from(total) else {
            fatal(InvariantViolation::TotalOutOfRange { total });
        };
        self.draws += 1;
        u64::from(self.rng.random_range(0..bound))
    }

    /// Number of draws taken so far.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R> std::fmt::Debug for WeightedSampler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedSampler")
            .field("draws", &self.draws)
            .finish_non_exhaustive()
    }
}

/// Resolve a fixed draw `r` against `weights`.
///
/// Returns the first index whose running sum exceeds `r`, or `None` when `r`
/// is at or beyond the total weight.
#[must_use]
pub fn locate<I>(weights: I, r: u64) -> Option<usize>
where
    I: IntoIterator<Item = u64>,
{
    walk(weights, r).ok()
}

/// Walk the weights; on exhaustion returns the accumulated sum.
fn walk<I>(weights: I, r: u64) -> Result<usize, u64>
where
    I: IntoIterator<Item = u64>,
{
    let mut running = 0u64;
    for (index, weight) in weights.into_iter().enumerate() {
        running = running.saturating_add(weight);
        if running > r {
            return Ok(index);
        }
    }
    Err(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_nonzero_bucket_always_wins() {
        for r in 0..5 {
            assert_eq!(locate([0, 0, 5, 0], r), Some(2), "draw {r}");
        }
        for seed in 0..64 {
            let mut sampler = WeightedSampler::with_seed(seed);
            assert_eq!(sampler.sample(&[0, 0, 5, 0], 5), 2);
        }
    }

    #[test]
    fn locate_boundaries() {
        let weights = [3u64, 0, 2, 1];
        assert_eq!(locate(weights, 0), Some(0));
        assert_eq!(locate(weights, 2), Some(0));
        assert_eq!(locate(weights, 3), Some(2));
        assert_eq!(locate(weights, 4), Some(2));
        assert_eq!(locate(weights, 5), Some(3));
        assert_eq!(locate(weights, 6), None);
    }

    #[test]
    fn zero_weight_buckets_never_chosen() {
        let weights = [0u64, 4, 0, 4, 0];
        let mut sampler = WeightedSampler::with_seed(99);
        for _ in 0..1_000 {
            let idx = sampler.sample(&weights, 8);
            assert!(idx == 1 || idx == 3, "picked zero-weight bucket {idx}");
        }
    }

    #[test]
    fn deterministic_with_seed() {
        let weights = [5u64, 1, 9, 3, 7];
        let mut a = WeightedSampler::with_seed(42);
        let mut b = WeightedSampler::with_seed(42);
        let seq_a: Vec<usize> = (0..200).map(|_| a.sample(&weights, 25)).collect();
        let seq_b: Vec<usize> = (0..200).map(|_| b.sample(&weights, 25)).collect();
        assert_eq!(seq_a, seq_b);
        assert_eq!(a.draws(), 200);
    }

    #[test]
    fn approximate_proportionality() {
        let weights = [1u64, 3, 6];
        let mut sampler = WeightedSampler::with_seed(2024);
        let mut counts = [0u64; 3];
        let trials = 60_000;
        for _ in 0..trials {
            counts[sampler.sample(&weights, 10)] += 1;
        }
        for (i, &w) in weights.iter().enumerate() {
            let expected = trials as f64 * w as f64 / 10.0;
            let ratio = counts[i] as f64 / expected;
            assert!(
                ratio > 0.9 && ratio < 1.1,
                "bucket {i}: count={}, expected={expected}",
                counts[i]
            );
        }
    }

    #[test]
    fn sample_iter_matches_sample() {
        let weights = [2u64, 0, 7, 1];
        let mut a = WeightedSampler::with_seed(5);
        let mut b = WeightedSampler::with_seed(5);
        for _ in 0..100 {
            assert_eq!(
                a.sample(&weights, 10),
                b.sample_iter(weights.iter().copied(), 10)
            );
        }
    }

    #[test]
    fn largest_32_bit_total_accepted() {
        let mut sampler = WeightedSampler::with_seed(1);
        let total = MAX_TOTAL - 1;
        let idx = sampler.sample_iter([total / 2, total - total / 2], total);
        assert!(idx < 2);
    }

    #[test]
    #[should_panic(expected = "sampler-empty-population")]
    fn empty_population_is_fatal() {
        let mut sampler = WeightedSampler::with_seed(0);
        sampler.sample(&[0, 0, 0], 0);
    }

    #[test]
    #[should_panic(expected = "sampler-weight-total-mismatch")]
    fn total_mismatch_is_fatal() {
        let mut sampler = WeightedSampler::with_seed(0);
        sampler.sample(&[1, 2, 3], 7);
    }

    #[test]
    #[should_panic(expected = "sampler-weight-total-mismatch")]
    fn exhausted_walk_is_fatal() {
        let mut sampler = WeightedSampler::with_seed(0);
        // Only a draw of 0 lands inside the single unit of weight.
        for _ in 0..64 {
            sampler.sample_iter([1u64], 1_000);
        }
    }

    #[test]
    #[should_panic(expected = "sampler-total-out-of-range")]
    fn oversized_total_is_fatal() {
        let mut sampler = WeightedSampler::with_seed(0);
        sampler.sample_iter([MAX_TOTAL], MAX_TOTAL);
    }

    #[test]
    fn debug_format() {
        let sampler = WeightedSampler::with_seed(3);
        let s = format!("{sampler:?}");
        assert!(s.contains("WeightedSampler"));
        assert!(s.contains("draws"));
    }
}
