//! Flash-block garbage-collection model.
//!
//! Physical blocks are tracked only as a histogram of how many valid units each
//! holds. A garbage-collection step erases one victim block and rewrites it
//! completely: its `v` still-valid units are relocated and `U - v` fresh
//! logical writes fill the rest. Those fresh writes overwrite logical units
//! that currently live somewhere else, so `U - v` valid units picked uniformly
//! at random across the device are invalidated.
//!
//! ```text
//!   select victim v ──► blocks_by_used[v] → blocks_by_used[U]
//!                                 │
//!               repeat U - v times▼
//!   sample occupancy u ∝ u·blocks_by_used[u] ──► u → u-1
//! ```
//!
//! The lower the victim occupancy, the more logical writes each erase absorbs:
//! write amplification is `U / (U - v̄)`.
//!
//! Conservation laws, checked by [`BlockOccupancyModel::check_invariants`]:
//!
//! - `Σ blocks_by_used == physical_blocks`
//! - `Σ used·blocks_by_used[used] == used_units`

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::histogram::Histogram;
use crate::invariant::{InvariantViolation, fatal};
use crate::model::{EventCounters, EventOutcome, ModelKind, ModelStats, OccupancyModel};
use crate::sampler::{MAX_TOTAL, WeightedSampler};

/// Relative tolerance when checking that a ratio split lands on a whole number.
const SPLIT_EPSILON: f64 = 1e-9;

// =============================================================================
// Configuration
// =============================================================================

/// How the garbage collector picks a victim block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimStrategy {
    /// The block with the fewest valid units (greedy cleaning).
    #[default]
    LeastUsed,
    /// Any non-full block, chosen uniformly.
    WeightedRandom,
}

impl VictimStrategy {
    pub const ALL: &'static str = "least_used, weighted_random";

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeastUsed => "least_used",
            Self::WeightedRandom => "weighted_random",
        }
    }
}

impl std::fmt::Display for VictimStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VictimStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "least_used" | "greedy" => Ok(Self::LeastUsed),
            "weighted_random" | "random" => Ok(Self::WeightedRandom),
            _ => Err(ConfigError::UnknownVariant {
                kind: "victim strategy",
                value: s.to_string(),
                expected: Self::ALL,
            }),
        }
    }
}

/// `blocks` blocks each holding `used` valid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyBucket {
    pub used: usize,
    pub blocks: u64,
}

/// Synthetic starting point for the block histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialDistribution {
    /// `physical_blocks · spare_ratio` empty blocks, the rest completely full.
    SpareEmpty { spare_ratio: f64 },
    /// Every block holding `U - U · spare_ratio` valid units.
    Even { spare_ratio: f64 },
    /// Explicit occupancy buckets; must account for every physical block.
    Explicit { buckets: Vec<OccupancyBucket> },
}

impl Default for InitialDistribution {
    fn default() -> Self {
        Self::SpareEmpty {
            spare_ratio: default_spare_ratio(),
        }
    }
}

impl InitialDistribution {
    /// Config tag of this distribution.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpareEmpty { .. } => "spare_empty",
            Self::Even { .. } => "even",
            Self::Explicit { .. } => "explicit",
        }
    }
}

fn default_spare_ratio() -> f64 {
    0.375
}

/// Parameters of the block model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Units per physical block (`U`).
    #[serde(default = "default_units_per_block")]
    pub units_per_block: usize,

    /// Total physical blocks.
    #[serde(default = "default_physical_blocks")]
    pub physical_blocks: u64,

    /// Victim selection.
    #[serde(default)]
    pub strategy: VictimStrategy,

    /// PRNG seed.
    #[serde(default)]
    pub seed: u64,

    /// Iterations excluded from the running average.
    #[serde(default)]
    pub warmup_iterations: u64,

    /// Starting histogram.
    #[serde(default)]
    pub initial_distribution: InitialDistribution,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            units_per_block: default_units_per_block(),
            physical_blocks: default_physical_blocks(),
            strategy: VictimStrategy::default(),
            seed: 0,
            warmup_iterations: 0,
            initial_distribution: InitialDistribution::default(),
        }
    }
}

fn default_units_per_block() -> usize {
    128
}

fn default_physical_blocks() -> u64 {
    1_000_000
}

/// Initial histogram derived from a [`BlockConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    /// `U + 1` counts indexed by valid units.
    pub counts: Vec<u64>,
    /// Valid logical units held (constant for the run).
    pub used_units: u64,
}

impl BlockConfig {
    /// Validate and expand the initial distribution.
    pub fn layout(&self) -> Result<BlockLayout, ConfigError> {
        let units = self.units_per_block;
        if units == 0 {
            return Err(ConfigError::TooSmall {
                field: "units_per_block",
                min: 1,
                value: 0,
            });
        }
        if units as u64 >= MAX_TOTAL {
            return Err(ConfigError::PopulationTooLarge {
                what: "units_per_block",
                total: units as u64,
            });
        }
        if self.physical_blocks == 0 {
            return Err(ConfigError::TooSmall {
                field: "physical_blocks",
                min: 1,
                value: 0,
            });
        }

        let mut counts = vec![0u64; units + 1];
        match &self.initial_distribution {
            InitialDistribution::SpareEmpty { spare_ratio } => {
                let spare = whole_split("physical_blocks", self.physical_blocks, *spare_ratio)?;
                counts[0] = spare;
                counts[units] = self.physical_blocks - spare;
            }
            InitialDistribution::Even { spare_ratio } => {
                whole_split("physical_blocks", self.physical_blocks, *spare_ratio)?;
                let free_units = whole_split("units_per_block", units as u64, *spare_ratio)?;
                counts[units - free_units as usize] = self.physical_blocks;
            }
            InitialDistribution::Explicit { buckets } => {
                for bucket in buckets {
                    if bucket.used > units {
                        return Err(ConfigError::ValidationError(format!(
                            "explicit bucket occupancy {} exceeds units_per_block {units}",
                            bucket.used
                        )));
                    }
                    counts[bucket.used] = counts[bucket.used].saturating_add(bucket.blocks);
                }
                let total = counts.iter().fold(0u64, |acc, &c| acc.saturating_add(c));
                if total != self.physical_blocks {
                    return Err(ConfigError::ValidationError(format!(
                        "explicit buckets hold {total} blocks but physical_blocks is {}",
                        self.physical_blocks
                    )));
                }
            }
        }
        // Ratio splits can round the spare share down to nothing.
        if counts[units] == self.physical_blocks {
            return Err(ConfigError::ValidationError(format!(
                "{} distribution leaves no block with reclaimable space",
                self.initial_distribution.kind()
            )));
        }

        let used_units: u64 = counts
            .iter()
            .enumerate()
            .map(|(used, &blocks)| (used as u64).saturating_mul(blocks))
            .fold(0u64, u64::saturating_add);
        // Mid-collection the sampled total briefly reaches used_units + U.
        if used_units.saturating_add(units as u64) >= MAX_TOTAL {
            return Err(ConfigError::PopulationTooLarge {
                what: "valid unit count",
                total: used_units,
            });
        }
        if self.physical_blocks >= MAX_TOTAL {
            return Err(ConfigError::PopulationTooLarge {
                what: "physical block count",
                total: self.physical_blocks,
            });
        }

        Ok(BlockLayout { counts, used_units })
    }
}

/// `total · ratio`, provided the ratio is in `(0, 1)` and the product is whole.
fn whole_split(field: &'static str, total: u64, ratio: f64) -> Result<u64, ConfigError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(ConfigError::RatioOutOfRange {
            field: "spare_ratio",
            range: "(0, 1)",
            value: ratio,
        });
    }
    let product = total as f64 * ratio;
    let rounded = product.round();
    if (product - rounded).abs() > SPLIT_EPSILON * product.max(1.0) {
        return Err(ConfigError::NonIntegralSplit {
            field,
            ratio,
            product,
        });
    }
    Ok(rounded as u64)
}

// =============================================================================
// Model
// =============================================================================

/// Histogram of physical blocks by valid-unit count.
#[derive(Debug)]
pub struct BlockOccupancyModel {
    config: BlockConfig,
    units_per_block: usize,
    blocks_by_used: Histogram,
    used_units: u64,
    sampler: WeightedSampler,
    counters: EventCounters,
}

impl BlockOccupancyModel {
    /// Build the initial histogram from the configured distribution.
    pub fn new(config: &BlockConfig) -> Result<Self, ConfigError> {
        let layout = config.layout()?;
        tracing::info!(
            units_per_block = config.units_per_block,
            physical_blocks = config.physical_blocks,
            used_units = layout.used_units,
            strategy = %config.strategy,
            seed = config.seed,
            "block model initialized"
        );
        Ok(Self {
            config: config.clone(),
            units_per_block: config.units_per_block,
            blocks_by_used: Histogram::from_counts(layout.counts),
            used_units: layout.used_units,
            sampler: WeightedSampler::with_seed(config.seed),
            counters: EventCounters::new(config.warmup_iterations),
        })
    }

    /// One garbage collection: erase and refill a victim, then invalidate the
    /// units its fresh writes replaced.
    pub fn advance(&mut self) -> EventOutcome {
        let units = self.units_per_block;
        let victim = self.select_victim();
        self.blocks_by_used.move_one(victim, units);

        let new_written = (units - victim) as u64;
        let mut valid = self.used_units + new_written;
        for _ in 0..new_written {
            let used = 1 + self.sampler.sample_iter(
                self.blocks_by_used.counts()[1..]
                    .iter()
                    .enumerate()
                    .map(|(i, &blocks)| (i as u64 + 1) * blocks),
                valid,
            );
            self.blocks_by_used.move_one(used, used - 1);
            valid -= 1;
        }

        tracing::trace!(victim, new_written, "block collected");
        self.counters.finish(Some((victim, new_written)))
    }

    fn select_victim(&mut self) -> usize {
        let units = self.units_per_block;
        let victim = match self.config.strategy {
            VictimStrategy::LeastUsed => self.blocks_by_used.first_nonzero_below(units),
            VictimStrategy::WeightedRandom => {
                let reclaimable =
                    self.blocks_by_used.population() - self.blocks_by_used.get(units);
                (reclaimable > 0).then(|| {
                    self.sampler.sample_iter(
                        self.blocks_by_used.counts()[..units].iter().copied(),
                        reclaimable,
                    )
                })
            }
        };
        victim.unwrap_or_else(|| {
            fatal(InvariantViolation::NoEligibleVictim {
                units_per_block: units,
            })
        })
    }

    /// Every occupancy bucket as `(valid units, blocks)`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, u64)> {
        self.blocks_by_used.snapshot()
    }

    /// Running statistics; write amplification is `U / (U - v̄)`.
    #[must_use]
    pub fn stats(&self) -> ModelStats {
        let wa = (self.counters.sampled() > 0).then(|| {
            let units = self.units_per_block as f64;
            units / (units - self.counters.average_victim())
        });
        self.counters.stats(wa)
    }

    /// Recount both conservation laws.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.blocks_by_used.check_population()?;
        let actual = self.blocks_by_used.weighted_sum();
        if actual != self.used_units {
            return Err(InvariantViolation::UsedUnitsDrift {
                expected: self.used_units,
                actual,
            });
        }
        Ok(())
    }

    /// The configuration this model was built from.
    #[must_use]
    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    /// The occupancy histogram.
    #[must_use]
    pub fn blocks_by_used(&self) -> &Histogram {
        &self.blocks_by_used
    }

    /// Units per block (`U`).
    #[must_use]
    pub fn units_per_block(&self) -> usize {
        self.units_per_block
    }

    /// Total physical blocks.
    #[must_use]
    pub fn physical_blocks(&self) -> u64 {
        self.blocks_by_used.population()
    }

    /// Valid logical units in the closed system.
    #[must_use]
    pub fn used_units(&self) -> u64 {
        self.used_units
    }

    /// Physical units not holding valid data.
    #[must_use]
    pub fn spare_units(&self) -> u64 {
        self.physical_blocks() * self.units_per_block as u64 - self.used_units
    }

    /// Occupancy and block count of the emptiest occupied bucket.
    #[must_use]
    pub fn most_free_block(&self) -> Option<(usize, u64)> {
        self.blocks_by_used
            .first_nonzero_below(self.units_per_block + 1)
            .map(|used| (used, self.blocks_by_used.get(used)))
    }
}

impl OccupancyModel for BlockOccupancyModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Block
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
