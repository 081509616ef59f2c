//! Shared model surface: event outcomes, running statistics, and the
//! [`OccupancyModel`] trait the run driver and reporters work against.

use serde::{Deserialize, Serialize};

use crate::invariant::InvariantViolation;

/// Which simulated system a model represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// RAM write-buffer admission/eviction.
    Buffer,
    /// Flash-block garbage collection.
    Block,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer => write!(f, "buffer"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// What one call to `advance()` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// Advances completed before this one (0 for the first call).
    pub iteration: u64,
    /// Whether an eviction (buffer) or garbage collection (block) happened.
    pub evicted: bool,
    /// Bucket index of the evicted candidate or collected block.
    pub victim: Option<usize>,
    /// Units reclaimed: flushed size for the buffer, `U - v` for the block.
    pub units_moved: u64,
}

/// Running statistics, serializable for reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    /// Total `advance()` calls.
    pub iterations: u64,
    /// Evictions or garbage collections performed.
    pub event_count: u64,
    /// Sum of `units_moved` over all events.
    pub cumulative_moved_units: u64,
    /// Mean victim bucket index over events past the warm-up window.
    pub running_average_victim_index: f64,
    /// Events that contributed to the running average.
    pub sampled_events: u64,
    /// Write-amplification estimate; `None` until an event has been sampled.
    pub write_amplification: Option<f64>,
}

/// A histogram-backed simulation advanced one event at a time.
pub trait OccupancyModel {
    /// The simulated system.
    fn kind(&self) -> ModelKind;

    /// Run one indivisible simulated event.
    fn advance(&mut self) -> EventOutcome;

    /// Every bucket as `(index, count)`, ascending. Must not mutate state.
    fn snapshot(&self) -> Vec<(usize, u64)>;

    /// Current running statistics.
    fn stats(&self) -> ModelStats;

    /// Recount every conservation law from scratch.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}

/// Event counters with a warm-up window excluded from the running average.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventCounters {
    warmup: u64,
    iterations: u64,
    events: u64,
    moved_units: u64,
    victim_sum: u128,
    sampled: u64,
}

impl EventCounters {
    pub(crate) fn new(warmup: u64) -> Self {
        Self {
            warmup,
            ..Self::default()
        }
    }

    pub(crate) fn iterations(&self) -> u64 {
        self.iterations
    }

    pub(crate) fn events(&self) -> u64 {
        self.events
    }

    pub(crate) fn sampled(&self) -> u64 {
        self.sampled
    }

    /// Close out the current advance, recording an event if one happened.
    pub(crate) fn finish(&mut self, event: Option<(usize, u64)>) -> EventOutcome {
        let iteration = self.iterations;
        self.iterations += 1;
        let Some((victim, units_moved)) = event else {
            return EventOutcome {
                iteration,
                ..EventOutcome::default()
            };
        };

        self.events += 1;
        self.moved_units += units_moved;
        if iteration >= self.warmup {
            self.victim_sum += victim as u128;
            self.sampled += 1;
        }
        EventOutcome {
            iteration,
            evicted: true,
            victim: Some(victim),
            units_moved,
        }
    }

    pub(crate) fn average_victim(&self) -> f64 {
        if self.sampled == 0 {
            0.0
        } else {
            self.victim_sum as f64 / self.sampled as f64
        }
    }

    /// Stats with the model-specific write-amplification figure filled in.
    pub(crate) fn stats(&self, write_amplification: Option<f64>) -> ModelStats {
        ModelStats {
            iterations: self.iterations,
            event_count: self.events,
            cumulative_moved_units: self.moved_units,
            running_average_victim_index: self.average_victim(),
            sampled_events: self.sampled,
            write_amplification,
        }
    }
}
