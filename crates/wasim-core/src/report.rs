//! Progress reports for both models.
//!
//! Plain reports are fixed-layout text meant for a terminal. [`ReportFrame`]
//! carries the same information as one JSON object per report.
//!
//! Block freedom histogram layout (`U = 128`, column width 12):
//!
//! ```text
//! Block freedom histogram
//!      -------     -------     ...
//!        0- 15      16- 31     ...     128-128
//!       625000           0     ...      375000
//! Most-free-block has 128(100%) free (375000 blocks of that usage) (0 used)
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::block::BlockOccupancyModel;
use crate::buffer::BufferOccupancyModel;
use crate::histogram::BucketCount;
use crate::model::{ModelKind, ModelStats};

/// Width of one histogram column.
const COLUMN_WIDTH: usize = 12;

/// Number of free-unit ranges the histogram groups `0..=U` into.
const HISTOGRAM_GROUPS: usize = 8;

fn percentage(part: u64, whole: u64) -> u64 {
    if whole == 0 { 0 } else { part * 100 / whole }
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.6}"))
}

// =============================================================================
// Buffer model
// =============================================================================

/// Free RAM, writes, flush count and the two flush ratios.
#[must_use]
pub fn render_buffer_report(model: &BufferOccupancyModel) -> String {
    let stats = model.stats();
    let mean_flushed = (stats.event_count > 0)
        .then(|| stats.cumulative_moved_units as f64 / stats.event_count as f64);

    let mut out = String::new();
    let _ = writeln!(out, "RAM free: {}", model.free_capacity());
    let _ = writeln!(out, "Writes: {}", stats.iterations);
    let _ = writeln!(out, "Flushed {} times", stats.event_count);
    let _ = writeln!(out, "Average units flushed each time: {}", ratio(mean_flushed));
    let _ = writeln!(out, "Writes / flushes: {}", ratio(stats.write_amplification));
    out
}

/// Parameters printed once before the first buffer report.
#[must_use]
pub fn render_buffer_header(model: &BufferOccupancyModel) -> String {
    let config = model.config();
    let mut out = String::new();
    let _ = writeln!(out, "CANDIDATES = {}", config.candidates);
    let _ = writeln!(out, "CAPACITY = {}", config.capacity);
    let _ = writeln!(out, "MAX_SIZE = {}", config.max_size);
    let _ = writeln!(out, "STRATEGY = {}", config.strategy);
    out
}

// =============================================================================
// Block model
// =============================================================================

/// Parameters printed once before the first block histogram.
#[must_use]
pub fn render_block_header(model: &BlockOccupancyModel) -> String {
    let units = model.units_per_block() as u64;
    let physical_units = model.physical_blocks() * units;
    let spare = model.spare_units();

    let mut out = String::new();
    let _ = writeln!(out, "UNITS_IN_BLOCK = {units}");
    let _ = writeln!(out, "PHYSICAL_BLOCKS = {}", model.physical_blocks());
    let _ = writeln!(out, "USED_UNITS = {}", model.used_units());
    let _ = writeln!(
        out,
        "Spare is {}% of physical address space (or {}% of logical)",
        percentage(spare, physical_units),
        percentage(spare, model.used_units())
    );
    out
}

/// Blocks grouped by free units, followed by the most-free block.
#[must_use]
pub fn render_block_histogram(model: &BlockOccupancyModel) -> String {
    let units = model.units_per_block();
    let jump = (units / HISTOGRAM_GROUPS).max(1);
    let counts = model.blocks_by_used().counts();
    let starts: Vec<usize> = (0..=units).step_by(jump).collect();

    let mut out = String::from("Block freedom histogram\n");
    for _ in &starts {
        let _ = write!(out, "{:>COLUMN_WIDTH$}", "-------");
    }
    out.push('\n');

    for &start in &starts {
        let end = (start + jump - 1).min(units);
        let _ = write!(out, "{:>COLUMN_WIDTH$}", format!("{start:>3}-{end:>3}"));
    }
    out.push('\n');

    for &start in &starts {
        let end = (start + jump - 1).min(units);
        let total: u64 = (start..=end).map(|free| counts[units - free]).sum();
        let _ = write!(out, " {total:>w$}", w = COLUMN_WIDTH - 1);
    }
    out.push('\n');

    if let Some((used, blocks)) = model.most_free_block() {
        let free = units - used;
        let _ = writeln!(
            out,
            "Most-free-block has {free}({}%) free ({blocks} blocks of that usage) ({used} used)",
            percentage(free as u64, units as u64)
        );
    }

    let stats = model.stats();
    if let Some(wa) = stats.write_amplification {
        let _ = writeln!(
            out,
            "Average victim occupancy: {:.3} (write amplification {wa:.4})",
            stats.running_average_victim_index
        );
    }
    out
}

// =============================================================================
// JSON frames
// =============================================================================

/// One progress report in machine-readable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFrame {
    pub model: ModelKind,
    pub iteration: u64,
    pub stats: ModelStats,
    /// Nonzero histogram buckets.
    pub buckets: Vec<BucketCount>,
    /// Free RAM slots; buffer model only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_capacity: Option<u64>,
    /// Valid units in the closed system; block model only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_units: Option<u64>,
}

impl ReportFrame {
    #[must_use]
    pub fn from_buffer(model: &BufferOccupancyModel) -> Self {
        let stats = model.stats();
        Self {
            model: ModelKind::Buffer,
            iteration: stats.iterations,
            stats,
            buckets: model.by_size().nonzero_buckets(),
            free_capacity: Some(model.free_capacity()),
            used_units: None,
        }
    }

    #[must_use]
    pub fn from_block(model: &BlockOccupancyModel) -> Self {
        let stats = model.stats();
        Self {
            model: ModelKind::Block,
            iteration: stats.iterations,
            stats,
            buckets: model.blocks_by_used().nonzero_buckets(),
            free_capacity: None,
            used_units: Some(model.used_units()),
        }
    }

    /// Single-line JSON.
    pub fn to_json_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
