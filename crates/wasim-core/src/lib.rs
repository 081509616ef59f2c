//! wasim-core: Monte-Carlo occupancy models for write amplification
//!
//! Two histogram-backed simulations share one sampling primitive:
//!
//! ```text
//!                 WeightedSampler (seeded StdRng)
//!                   │                       │
//!      BufferOccupancyModel        BlockOccupancyModel
//!      RAM write buffer:           flash garbage collection:
//!      candidates by size          blocks by valid units
//!                   │                       │
//!                   └──── runner::run ──────┘
//!                              │
//!                 report (plain text / JSON frames)
//! ```
//!
//! # Modules
//!
//! - `sampler`: weighted index selection over nonnegative weights
//! - `histogram`: population-conserving bucket counts
//! - `buffer`: RAM write-buffer admission/eviction model
//! - `block`: flash-block garbage-collection model
//! - `model`: event outcomes, running statistics, the `OccupancyModel` trait
//! - `invariant`: named conservation-law violations (always fatal)
//! - `runner`: bounded/unbounded runs with periodic reports, seed sweeps
//! - `report`: plain-text reports and JSON frames
//! - `config`: `wasim.toml` loading and validation
//! - `logging`: tracing subscriber setup
//! - `error`: recoverable errors with remediation hints
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod block;
pub mod buffer;
pub mod config;
pub mod error;
pub mod histogram;
pub mod invariant;
pub mod logging;
pub mod model;
pub mod report;
pub mod runner;
pub mod sampler;

pub use error::{Error, Result};
pub use model::{EventOutcome, ModelKind, ModelStats, OccupancyModel};

/// Version of the wasim-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
