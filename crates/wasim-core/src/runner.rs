//! Run driver and multi-seed sweep.
//!
//! [`run`] advances one model, reporting at iteration 0, every
//! `report_interval` iterations, and once more at the end of a bounded run.
//! Each report is preceded by a full invariant recount; a failed recount is
//! fatal.
//!
//! [`sweep`] runs independent models, one per seed, on scoped worker threads.
//! Models never share state, so the per-seed results are identical to running
//! the seeds one after another.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::invariant::fatal;
use crate::model::{ModelStats, OccupancyModel};

/// How long to run and how often to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Total advances; `None` runs until the process is stopped.
    pub iterations: Option<u64>,
    /// Iterations between reports, at least 1.
    pub report_interval: u64,
}

impl RunPlan {
    #[must_use]
    pub fn bounded(iterations: u64, report_interval: u64) -> Self {
        Self {
            iterations: Some(iterations),
            report_interval,
        }
    }

    #[must_use]
    pub fn unbounded(report_interval: u64) -> Self {
        Self {
            iterations: None,
            report_interval,
        }
    }
}

fn verify<M: OccupancyModel>(model: &M) {
    if let Err(violation) = model.check_invariants() {
        fatal(violation);
    }
}

/// Advance `model` according to `plan`, calling `on_report` at each report
/// point. Returns the final statistics, or the first error `on_report` raised.
pub fn run<M, F>(model: &mut M, plan: &RunPlan, mut on_report: F) -> crate::Result<ModelStats>
where
    M: OccupancyModel,
    F: FnMut(&M) -> crate::Result<()>,
{
    let interval = plan.report_interval.max(1);
    let span = tracing::info_span!("run", model = %model.kind(), iterations = ?plan.iterations);
    let _guard = span.enter();

    let mut iteration = 0u64;
    loop {
        let due = iteration % interval == 0;
        let finished = plan.iterations.is_some_and(|n| iteration >= n);
        if due || finished {
            verify(model);
            let stats = model.stats();
            tracing::debug!(
                iteration,
                events = stats.event_count,
                average_victim = stats.running_average_victim_index,
                "report"
            );
            on_report(model)?;
        }
        if finished {
            break;
        }
        model.advance();
        iteration += 1;
    }

    let stats = model.stats();
    tracing::info!(
        iterations = stats.iterations,
        events = stats.event_count,
        write_amplification = ?stats.write_amplification,
        "run complete"
    );
    Ok(stats)
}

// =============================================================================
// Sweep
// =============================================================================

/// Final statistics of one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRun {
    pub seed: u64,
    pub stats: ModelStats,
}

/// Per-seed results plus the spread of the running-average victim index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Sorted by seed.
    pub runs: Vec<SeedRun>,
    pub mean_victim_index: f64,
    pub min_victim_index: f64,
    pub max_victim_index: f64,
}

impl SweepSummary {
    fn from_runs(mut runs: Vec<SeedRun>) -> Self {
        runs.sort_by_key(|run| run.seed);
        let values: Vec<f64> = runs
            .iter()
            .map(|run| run.stats.running_average_victim_index)
            .collect();
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            runs,
            mean_victim_index: mean,
            min_victim_index: if values.is_empty() { 0.0 } else { min },
            max_victim_index: if values.is_empty() { 0.0 } else { max },
        }
    }
}

/// Run one model per seed for `iterations` advances on up to `threads`
/// worker threads.
///
/// `make_model` builds the model for a seed; the first construction error
/// aborts the sweep. An invariant fault in any worker propagates as a panic.
pub fn sweep<M, F>(
    seeds: &[u64],
    threads: usize,
    make_model: F,
    iterations: u64,
) -> Result<SweepSummary, ConfigError>
where
    M: OccupancyModel,
    F: Fn(u64) -> Result<M, ConfigError> + Sync,
{
    if seeds.is_empty() {
        return Ok(SweepSummary::from_runs(Vec::new()));
    }
    let threads = threads.clamp(1, seeds.len());
    let chunk = seeds.len().div_ceil(threads);
    let make_model = &make_model;

    tracing::info!(seeds = seeds.len(), threads, iterations, "sweep started");

    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .chunks(chunk)
            .map(|batch| {
                scope.spawn(move || -> Result<Vec<SeedRun>, ConfigError> {
                    batch
                        .iter()
                        .map(|&seed| {
                            let mut model = make_model(seed)?;
                            for _ in 0..iterations {
                                model.advance();
                            }
                            verify(&model);
                            Ok(SeedRun {
                                seed,
                                stats: model.stats(),
                            })
                        })
                        .collect()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect::<Vec<_>>()
    });

    let mut runs = Vec::with_capacity(seeds.len());
    for batch in results {
        runs.extend(batch?);
    }
    let summary = SweepSummary::from_runs(runs);
    tracing::info!(
        mean = summary.mean_victim_index,
        min = summary.min_victim_index,
        max = summary.max_victim_index,
        "sweep complete"
    );
    Ok(summary)
}
