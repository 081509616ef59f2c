//! RAM write-buffer admission/eviction model.
//!
//! A fixed population of candidates (think: logical buckets that accumulate
//! writes while they sit in RAM) is tracked only as a histogram of how many
//! units each has accumulated. Every simulated write picks a candidate
//! uniformly at random, which is the same as picking a size bucket weighted by
//! its population, and grows it by one unit, consuming one RAM slot. When the
//! slots run out a victim is flushed back to size 0, returning its units to the
//! free pool.
//!
//! ```text
//!   advance ──► sample size k ∝ by_size[k] ──► k → k+1, free -= 1
//!                                                   │
//!                                          free == 0 ▼
//!                             pick victim (strategy) ──► size → 0, free += size
//! ```
//!
//! Conservation laws, checked by [`BufferOccupancyModel::check_invariants`]:
//!
//! - `Σ by_size == candidates`
//! - `Σ size·by_size[size] + free_capacity == capacity`
//! - `last_nonzero` is the largest occupied size

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::histogram::Histogram;
use crate::invariant::{InvariantViolation, fatal};
use crate::model::{EventCounters, EventOutcome, ModelKind, ModelStats, OccupancyModel};
use crate::sampler::{MAX_TOTAL, WeightedSampler};

// =============================================================================
// Configuration
// =============================================================================

/// How a victim is chosen once the buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Flush the largest candidate.
    #[default]
    GreedyLargest,
    /// Flush a nonempty candidate chosen uniformly, i.e. a size bucket
    /// weighted by its population.
    WeightedRandomNonzero,
}

impl EvictionStrategy {
    pub const ALL: &'static str = "greedy_largest, weighted_random_nonzero";

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GreedyLargest => "greedy_largest",
            Self::WeightedRandomNonzero => "weighted_random_nonzero",
        }
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "greedy_largest" | "greedy" => Ok(Self::GreedyLargest),
            "weighted_random_nonzero" | "weighted_random" | "random" => {
                Ok(Self::WeightedRandomNonzero)
            }
            _ => Err(ConfigError::UnknownVariant {
                kind: "eviction strategy",
                value: s.to_string(),
                expected: Self::ALL,
            }),
        }
    }
}

/// Parameters of the buffer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Number of candidates tracked (all start at size 0).
    #[serde(default = "default_candidates")]
    pub candidates: u64,

    /// RAM slots available before a flush is forced.
    #[serde(default = "default_capacity")]
    pub capacity: u64,

    /// Number of size buckets; a candidate reaching this size is a fault.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Victim selection once the buffer is full.
    #[serde(default)]
    pub strategy: EvictionStrategy,

    /// PRNG seed.
    #[serde(default)]
    pub seed: u64,

    /// Iterations excluded from the running average.
    #[serde(default)]
    pub warmup_iterations: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            capacity: default_capacity(),
            max_size: default_max_size(),
            strategy: EvictionStrategy::default(),
            seed: 0,
            warmup_iterations: 0,
        }
    }
}

fn default_candidates() -> u64 {
    1 << 23
}

fn default_capacity() -> u64 {
    1 << 24
}

fn default_max_size() -> usize {
    4096
}

impl BufferConfig {
    /// Reject parameters the model cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates == 0 {
            return Err(ConfigError::TooSmall {
                field: "candidates",
                min: 1,
                value: 0,
            });
        }
        if self.candidates >= MAX_TOTAL {
            return Err(ConfigError::PopulationTooLarge {
                what: "candidate population",
                total: self.candidates,
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::TooSmall {
                field: "capacity",
                min: 1,
                value: 0,
            });
        }
        if self.max_size < 2 {
            return Err(ConfigError::TooSmall {
                field: "max_size",
                min: 2,
                value: self.max_size as u64,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Model
// =============================================================================

/// Histogram of buffered candidates by accumulated size.
#[derive(Debug)]
pub struct BufferOccupancyModel {
    config: BufferConfig,
    by_size: Histogram,
    free_capacity: u64,
    last_nonzero: usize,
    sampler: WeightedSampler,
    counters: EventCounters,
}

impl BufferOccupancyModel {
    /// Build the initial state: every candidate at size 0, all slots free.
    pub fn new(config: &BufferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if (config.max_size as u64) <= config.capacity {
            tracing::warn!(
                max_size = config.max_size,
                capacity = config.capacity,
                "max_size does not exceed capacity; a candidate may overflow the histogram"
            );
        }
        tracing::info!(
            candidates = config.candidates,
            capacity = config.capacity,
            max_size = config.max_size,
            strategy = %config.strategy,
            seed = config.seed,
            "buffer model initialized"
        );
        Ok(Self {
            config: config.clone(),
            by_size: Histogram::concentrated(config.max_size, 0, config.candidates),
            free_capacity: config.capacity,
            last_nonzero: 0,
            sampler: WeightedSampler::with_seed(config.seed),
            counters: EventCounters::new(config.warmup_iterations),
        })
    }

    /// One simulated write, plus a flush if it filled the buffer.
    pub fn advance(&mut self) -> EventOutcome {
        let population = self.by_size.population();
        let size = self
            .sampler
            .sample_iter(self.by_size.counts().iter().copied(), population);

        let grown = size + 1;
        if grown >= self.by_size.len() {
            fatal(InvariantViolation::SizeOverflow {
                size: grown,
                max_size: self.by_size.len(),
            });
        }
        let Some(free) = self.free_capacity.checked_sub(1) else {
            fatal(self.capacity_drift());
        };
        self.by_size.move_one(size, grown);
        self.free_capacity = free;
        self.last_nonzero = self.last_nonzero.max(grown);

        let event = if self.free_capacity == 0 {
            let evicted = self.evict();
            Some((evicted, evicted as u64))
        } else {
            None
        };
        self.counters.finish(event)
    }

    /// Flush one victim back to size 0 and return its size.
    fn evict(&mut self) -> usize {
        let size = match self.config.strategy {
            EvictionStrategy::GreedyLargest => self.last_nonzero,
            EvictionStrategy::WeightedRandomNonzero => {
                let nonempty = self.by_size.population() - self.by_size.get(0);
                1 + self
                    .sampler
                    .sample_iter(self.by_size.counts()[1..].iter().copied(), nonempty)
            }
        };
        if size == 0 {
            fatal(InvariantViolation::ZeroSizeVictim);
        }

        self.by_size.move_one(size, 0);
        if size == self.last_nonzero {
            while self.last_nonzero > 0 && self.by_size.get(self.last_nonzero) == 0 {
                self.last_nonzero -= 1;
            }
        }
        self.free_capacity += size as u64;

        tracing::trace!(
            size,
            free_capacity = self.free_capacity,
            largest = self.last_nonzero,
            "buffer eviction"
        );
        size
    }

    fn capacity_drift(&self) -> InvariantViolation {
        InvariantViolation::CapacityDrift {
            capacity: self.config.capacity,
            buffered: self.by_size.weighted_sum(),
            free: self.free_capacity,
        }
    }

    /// Every size bucket as `(size, candidates)`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, u64)> {
        self.by_size.snapshot()
    }

    /// Running statistics; write amplification is admitted units per eviction.
    #[must_use]
    pub fn stats(&self) -> ModelStats {
        let events = self.counters.events();
        let proxy = (events > 0).then(|| self.counters.iterations() as f64 / events as f64);
        self.counters.stats(proxy)
    }

    /// Recount every conservation law.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.by_size.check_population()?;

        let buffered = self.by_size.weighted_sum();
        if buffered + self.free_capacity != self.config.capacity {
            return Err(self.capacity_drift());
        }

        let actual = self.by_size.last_nonzero().unwrap_or(0);
        if actual != self.last_nonzero {
            return Err(InvariantViolation::LastNonzeroDrift {
                cached: self.last_nonzero,
                actual,
            });
        }
        Ok(())
    }

    /// The configuration this model was built from.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// The size histogram.
    #[must_use]
    pub fn by_size(&self) -> &Histogram {
        &self.by_size
    }

    /// Remaining RAM slots.
    #[must_use]
    pub fn free_capacity(&self) -> u64 {
        self.free_capacity
    }

    /// Largest occupied size.
    #[must_use]
    pub fn last_nonzero(&self) -> usize {
        self.last_nonzero
    }

    /// Units currently held in RAM.
    #[must_use]
    pub fn buffered_units(&self) -> u64 {
        self.config.capacity - self.free_capacity
    }
}

impl OccupancyModel for BufferOccupancyModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Buffer
    }

    fn advance(&mut self) -> EventOutcome {
        Self::advance(self)
    }

    fn snapshot(&self) -> Vec<(usize, u64)> {
        Self::snapshot(self)
    }

    fn stats(&self) -> ModelStats {
        Self::stats(self)
    }

    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        Self::check_invariants(self)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small(capacity: u64, strategy: EvictionStrategy) -> BufferConfig {
        BufferConfig {
            candidates: 64,
            capacity,
            max_size: 256,
            strategy,
            seed: 11,
            warmup_iterations: 0,
        }
    }

    #[test]
    fn initial_state() {
        let model = BufferOccupancyModel::new(&small(32, EvictionStrategy::GreedyLargest)).unwrap();
        assert_eq!(model.free_capacity(), 32);
        assert_eq!(model.last_nonzero(), 0);
        assert_eq!(model.by_size().get(0), 64);
        assert_eq!(model.buffered_units(), 0);
        assert!(model.check_invariants().is_ok());
        assert_eq!(model.stats(), ModelStats::default());
    }

    #[test]
    fn capacity_one_evicts_every_advance() {
        for strategy in [
            EvictionStrategy::GreedyLargest,
            EvictionStrategy::WeightedRandomNonzero,
        ] {
            let mut model = BufferOccupancyModel::new(&small(1, strategy)).unwrap();
            for i in 0..500 {
                let outcome = model.advance();
                assert!(outcome.evicted, "{strategy}: no eviction at {i}");
                assert_eq!(outcome.victim, Some(1));
                assert_eq!(outcome.units_moved, 1);
                assert_eq!(model.free_capacity(), 1);
            }
            let stats = model.stats();
            assert_eq!(stats.event_count, 500);
            assert_eq!(stats.write_amplification, Some(1.0));
        }
    }

    #[test]
    fn no_eviction_until_full() {
        let mut model = BufferOccupancyModel::new(&small(10, EvictionStrategy::GreedyLargest)).unwrap();
        for _ in 0..9 {
            assert!(!model.advance().evicted);
        }
        assert_eq!(model.free_capacity(), 1);
        assert_eq!(model.buffered_units(), 9);
        let outcome = model.advance();
        assert!(outcome.evicted);
        assert_eq!(outcome.iteration, 9);
        assert!(model.free_capacity() >= 1);
    }

    #[test]
    fn greedy_flushes_largest() {
        let mut model = BufferOccupancyModel::new(&small(16, EvictionStrategy::GreedyLargest)).unwrap();
        for _ in 0..2_000 {
            let largest_before = model.last_nonzero();
            let outcome = model.advance();
            if let Some(victim) = outcome.victim {
                // The grown candidate may have become the new maximum.
                assert!(victim >= largest_before);
            }
        }
    }

    #[test]
    fn invariants_hold_every_step() {
        for strategy in [
            EvictionStrategy::GreedyLargest,
            EvictionStrategy::WeightedRandomNonzero,
        ] {
            let mut model = BufferOccupancyModel::new(&small(40, strategy)).unwrap();
            for _ in 0..3_000 {
                model.advance();
                model.check_invariants().unwrap();
                assert_eq!(model.by_size().population(), 64);
            }
        }
    }

    #[test]
    fn same_seed_same_outcomes() {
        let config = small(24, EvictionStrategy::WeightedRandomNonzero);
        let mut a = BufferOccupancyModel::new(&config).unwrap();
        let mut b = BufferOccupancyModel::new(&config).unwrap();
        for _ in 0..1_000 {
            assert_eq!(a.advance(), b.advance());
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn mean_flush_size_matches_counters() {
        let mut model = BufferOccupancyModel::new(&small(32, EvictionStrategy::GreedyLargest)).unwrap();
        let mut flushed = 0u64;
        let mut events = 0u64;
        for _ in 0..5_000 {
            let outcome = model.advance();
            if outcome.evicted {
                flushed += outcome.units_moved;
                events += 1;
            }
        }
        let stats = model.stats();
        assert_eq!(stats.cumulative_moved_units, flushed);
        assert_eq!(stats.event_count, events);
        let mean = flushed as f64 / events as f64;
        assert!((stats.running_average_victim_index - mean).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "buffer-size-overflow")]
    fn overflow_is_fatal() {
        // One candidate, so every write lands on it; two buckets hold sizes 0..=1.
        let config = BufferConfig {
            candidates: 1,
            capacity: 10,
            max_size: 2,
            ..BufferConfig::default()
        };
        let mut model = BufferOccupancyModel::new(&config).unwrap();
        model.advance();
        model.advance();
    }

    #[test]
    fn rejects_bad_config() {
        let zero_capacity = BufferConfig {
            capacity: 0,
            ..BufferConfig::default()
        };
        assert!(matches!(
            BufferOccupancyModel::new(&zero_capacity),
            Err(ConfigError::TooSmall { field: "capacity", .. })
        ));

        let huge = BufferConfig {
            candidates: MAX_TOTAL,
            ..BufferConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::PopulationTooLarge { .. })
        ));

        let tiny = BufferConfig {
            max_size: 1,
            ..BufferConfig::default()
        };
        assert!(matches!(
            tiny.validate(),
            Err(ConfigError::TooSmall { field: "max_size", .. })
        ));
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!(
            "greedy_largest".parse::<EvictionStrategy>().unwrap(),
            EvictionStrategy::GreedyLargest
        );
        assert_eq!(
            "weighted-random-nonzero".parse::<EvictionStrategy>().unwrap(),
            EvictionStrategy::WeightedRandomNonzero
        );
        assert!("lru".parse::<EvictionStrategy>().is_err());
        assert_eq!(
            EvictionStrategy::WeightedRandomNonzero.to_string(),
            "weighted_random_nonzero"
        );
    }
}
