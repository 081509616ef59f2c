//! Population-conserving bucket histogram.
//!
//! A [`Histogram`] is an owned array of counts indexed `0..=max_index`. After
//! construction the only mutation is [`Histogram::move_one`], which takes one
//! member out of a bucket and puts it in another, so the total population is
//! fixed for the lifetime of the model that owns it. Indexing outside the
//! array or emptying a bucket that is already empty is a fatal invariant
//! fault, never a silent clamp.

use serde::{Deserialize, Serialize};

use crate::invariant::{InvariantViolation, fatal};

/// One `(bucket, count)` pair, as exposed in serialized reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    pub index: usize,
    pub count: u64,
}

/// Counts per bucket with a fixed total population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
    population: u64,
}

impl Histogram {
    /// Build a histogram from explicit counts.
    ///
    /// # Panics
    ///
    /// Panics if `counts` is empty.
    #[must_use]
    pub fn from_counts(counts: Vec<u64>) -> Self {
        assert!(!counts.is_empty(), "histogram needs at least one bucket");
        let population = counts.iter().sum();
        Self { counts, population }
    }

    /// `buckets` buckets with the whole `population` in bucket `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= buckets`.
    #[must_use]
    pub fn concentrated(buckets: usize, index: usize, population: u64) -> Self {
        assert!(index < buckets, "bucket {index} outside 0..{buckets}");
        let mut counts = vec![0; buckets];
        counts[index] = population;
        Self::from_counts(counts)
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Always false: a histogram has at least one bucket.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Highest valid bucket index.
    #[must_use]
    pub fn max_index(&self) -> usize {
        self.counts.len() - 1
    }

    /// Total members across all buckets.
    #[must_use]
    pub fn population(&self) -> u64 {
        self.population
    }

    /// Count in bucket `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> u64 {
        match self.counts.get(index) {
            Some(&count) => count,
            None => fatal(self.out_of_range(index)),
        }
    }

    /// Raw counts, ascending by bucket.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Move one member from bucket `from` to bucket `to`.
    pub fn move_one(&mut self, from: usize, to: usize) {
        for index in [from, to] {
            if index >= self.counts.len() {
                fatal(self.out_of_range(index));
            }
        }
        let Some(remaining) = self.counts[from].checked_sub(1) else {
            fatal(InvariantViolation::BucketUnderflow { index: from });
        };
        self.counts[from] = remaining;
        self.counts[to] += 1;
    }

    /// Lowest bucket below `end` holding at least one member.
    #[must_use]
    pub fn first_nonzero_below(&self, end: usize) -> Option<usize> {
        let end = end.min(self.counts.len());
        self.counts[..end].iter().position(|&c| c > 0)
    }

    /// Highest bucket holding at least one member.
    #[must_use]
    pub fn last_nonzero(&self) -> Option<usize> {
        self.counts.iter().rposition(|&c| c > 0)
    }

    /// `Σ index · count`, the number of units held when the bucket index is a
    /// per-member unit count.
    #[must_use]
    pub fn weighted_sum(&self) -> u64 {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| i as u64 * c)
            .sum()
    }

    /// Every bucket as `(index, count)`, ascending. Read-only.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, u64)> {
        self.counts.iter().copied().enumerate().collect()
    }

    /// Buckets with a nonzero count.
    #[must_use]
    pub fn nonzero_buckets(&self) -> Vec<BucketCount> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(index, &count)| BucketCount { index, count })
            .collect()
    }

    /// Recount the buckets and compare against the fixed population.
    pub fn check_population(&self) -> Result<(), InvariantViolation> {
        let actual: u64 = self.counts.iter().sum();
        if actual == self.population {
            Ok(())
        } else {
            Err(InvariantViolation::PopulationDrift {
                expected: self.population,
                actual,
            })
        }
    }

    fn out_of_range(&self, index: usize) -> InvariantViolation {
        InvariantViolation::BucketOutOfRange {
            index,
            max: self.counts.len().saturating_sub(1),
        }
    }
}
