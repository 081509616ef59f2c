//! Named invariant faults for the simulation loop.
//!
//! Every model is a deterministic function of its prior state and its PRNG
//! stream, so once a histogram drifts every later figure is meaningless. There
//! is no recovery path: [`fatal`] logs the violated invariant and panics with
//! its stable name, so a failing run (or a `#[should_panic]` test) always says
//! exactly which law broke.
//!
//! Configuration mistakes are *not* reported here; those are caught at model
//! construction as [`ConfigError`](crate::error::ConfigError).

use thiserror::Error;

/// An internal-consistency law that a model or the sampler found broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("sampler called with an empty population (total = 0)")]
    EmptyPopulation,

    #[error("sampler total {total} does not fit a 32-bit uniform draw")]
    TotalOutOfRange { total: u64 },

    #[error("sampler weights sum to {actual} but the caller passed total {expected}")]
    WeightTotalMismatch { expected: u64, actual: u64 },

    #[error("bucket {index} is outside histogram 0..={max}")]
    BucketOutOfRange { index: usize, max: usize },

    #[error("bucket {index} is empty and cannot give up a member")]
    BucketUnderflow { index: usize },

    #[error("histogram population drifted: expected {expected}, counted {actual}")]
    PopulationDrift { expected: u64, actual: u64 },

    #[error("valid units drifted: expected {expected}, counted {actual}")]
    UsedUnitsDrift { expected: u64, actual: u64 },

    #[error("buffer slots drifted: capacity {capacity} != buffered {buffered} + free {free}")]
    CapacityDrift {
        capacity: u64,
        buffered: u64,
        free: u64,
    },

    #[error("cached largest size {cached} disagrees with histogram maximum {actual}")]
    LastNonzeroDrift { cached: usize, actual: usize },

    #[error("candidate grew to size {size} but the histogram only holds sizes below {max_size}")]
    SizeOverflow { size: usize, max_size: usize },

    #[error("no block with fewer than {units_per_block} valid units is available for collection")]
    NoEligibleVictim { units_per_block: usize },

    #[error("eviction chose a size-0 candidate")]
    ZeroSizeVictim,
}

impl InvariantViolation {
    /// Stable kebab-case identifier, used in logs and panic messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EmptyPopulation => "sampler-empty-population",
            Self::TotalOutOfRange { .. } => "sampler-total-out-of-range",
            Self::WeightTotalMismatch { .. } => "sampler-weight-total-mismatch",
            Self::BucketOutOfRange { .. } => "histogram-bucket-out-of-range",
            Self::BucketUnderflow { .. } => "histogram-bucket-underflow",
            Self::PopulationDrift { .. } => "histogram-population-drift",
            Self::UsedUnitsDrift { .. } => "block-used-units-drift",
            Self::CapacityDrift { .. } => "buffer-capacity-drift",
            Self::LastNonzeroDrift { .. } => "buffer-last-nonzero-drift",
            Self::SizeOverflow { .. } => "buffer-size-overflow",
            Self::NoEligibleVictim { .. } => "block-no-eligible-victim",
            Self::ZeroSizeVictim => "buffer-zero-size-victim",
        }
    }
}

/// Abort the simulation on a broken invariant.
///
/// # Panics
///
/// Always. The panic message has the form
/// `invariant violated [<name>]: <details>`.
#[cold]
#[track_caller]
pub fn fatal(violation: InvariantViolation) -> ! {
    tracing::error!(
        invariant = violation.name(),
        detail = %violation,
        "simulation invariant violated"
    );
    panic!("invariant violated [{}]: {}", violation.name(), violation);
}
