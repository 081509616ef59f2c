//! `wasim` - Monte-Carlo write-amplification simulator
//!
//! ```text
//! wasim buffer [--iterations N] [--strategy greedy_largest|weighted_random_nonzero]
//! wasim block  [--iterations N] [--strategy least_used|weighted_random]
//! wasim sweep  <buffer|block> --iterations N [--seeds K] [--threads T]
//! wasim config show|validate
//! ```
//!
//! Reports go to stdout, logs to stderr. Exit codes: 0 success, 2 invalid
//! configuration, 1 anything else.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use wasim_core::block::{BlockConfig, BlockOccupancyModel, VictimStrategy};
use wasim_core::buffer::{BufferConfig, BufferOccupancyModel, EvictionStrategy};
use wasim_core::config::{OutputFormat, SimConfig};
use wasim_core::error::ConfigError;
use wasim_core::logging::init_logging;
use wasim_core::report::{self, ReportFrame};
use wasim_core::runner::{self, RunPlan};

const EXIT_CONFIG: u8 = 2;
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "wasim", version, about = "Monte-Carlo write-amplification simulator")]
struct Cli {
    /// Config file (TOML); defaults apply when omitted
    #[arg(long, global = true, env = "WASIM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate RAM write-buffer eviction
    Buffer(BufferArgs),
    /// Simulate flash-block garbage collection
    Block(BlockArgs),
    /// Run one model per seed in parallel and summarize
    Sweep {
        #[command(subcommand)]
        model: SweepModel,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration and exit
    Validate,
}

#[derive(Args)]
struct RunArgs {
    /// Stop after this many advances (runs until interrupted when omitted)
    #[arg(long)]
    iterations: Option<u64>,

    /// PRNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Iterations between reports
    #[arg(long)]
    report_every: Option<u64>,

    /// Iterations excluded from the running average
    #[arg(long)]
    warmup: Option<u64>,

    /// Report format
    #[arg(long)]
    format: Option<OutputFormat>,
}

#[derive(Args)]
struct BufferArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Eviction strategy
    #[arg(long)]
    strategy: Option<EvictionStrategy>,
}

#[derive(Args)]
struct BlockArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Victim selection strategy
    #[arg(long)]
    strategy: Option<VictimStrategy>,
}

#[derive(Subcommand)]
enum SweepModel {
    /// Sweep the RAM write-buffer model
    Buffer {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Eviction strategy
        #[arg(long)]
        strategy: Option<EvictionStrategy>,
    },
    /// Sweep the flash-block model
    Block {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Victim selection strategy
        #[arg(long)]
        strategy: Option<VictimStrategy>,
    },
}

#[derive(Args)]
struct SweepArgs {
    /// Advances per seed
    #[arg(long)]
    iterations: u64,

    /// Number of seeds, counting up from --seed
    #[arg(long, default_value_t = 8)]
    seeds: u64,

    /// First seed
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Iterations excluded from the running average
    #[arg(long)]
    warmup: Option<u64>,

    /// Summary format
    #[arg(long)]
    format: Option<OutputFormat>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let config_error = err.chain().find_map(|cause| {
                cause.downcast_ref::<ConfigError>().cloned().or_else(|| {
                    match cause.downcast_ref::<wasim_core::Error>() {
                        Some(wasim_core::Error::Config(inner)) => Some(inner.clone()),
                        _ => None,
                    }
                })
            });
            if let Some(config_error) = config_error {
                eprint!("{}", config_error.remediation().render_plain());
                ExitCode::from(EXIT_CONFIG)
            } else {
                if let Some(remediation) = err
                    .downcast_ref::<wasim_core::Error>()
                    .and_then(wasim_core::Error::remediation)
                {
                    eprint!("{}", remediation.render_plain());
                }
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig, ConfigError> {
    path.map_or_else(|| Ok(SimConfig::default()), SimConfig::load_from)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }

    match cli.command {
        Commands::Config { command } => run_config(&config, &command),
        Commands::Buffer(args) => {
            apply_buffer_args(&mut config, &args);
            start(&config)?;
            run_buffer(&config, &args.run)
        }
        Commands::Block(args) => {
            apply_block_args(&mut config, &args);
            start(&config)?;
            run_block(&config, &args.run)
        }
        Commands::Sweep { model } => run_sweep(config, &model),
    }
}

/// Validate, then bring up logging.
fn start(config: &SimConfig) -> anyhow::Result<()> {
    config.validate()?;
    init_logging(&config.log_config()).map_err(wasim_core::Error::from)?;
    Ok(())
}

fn run_config(config: &SimConfig, command: &ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigCommand::Validate => {
            config.validate()?;
            println!("Config OK");
        }
    }
    Ok(())
}

fn apply_common(
    run: &RunArgs,
    seed: &mut u64,
    warmup: &mut u64,
    interval: &mut u64,
    format: &mut OutputFormat,
) {
    if let Some(value) = run.seed {
        *seed = value;
    }
    if let Some(value) = run.warmup {
        *warmup = value;
    }
    if let Some(value) = run.report_every {
        *interval = value;
    }
    if let Some(value) = run.format {
        *format = value;
    }
}

fn apply_buffer_args(config: &mut SimConfig, args: &BufferArgs) {
    apply_common(
        &args.run,
        &mut config.buffer.seed,
        &mut config.buffer.warmup_iterations,
        &mut config.report.buffer_interval,
        &mut config.report.format,
    );
    if let Some(strategy) = args.strategy {
        config.buffer.strategy = strategy;
    }
}

fn apply_block_args(config: &mut SimConfig, args: &BlockArgs) {
    apply_common(
        &args.run,
        &mut config.block.seed,
        &mut config.block.warmup_iterations,
        &mut config.report.block_interval,
        &mut config.report.format,
    );
    if let Some(strategy) = args.strategy {
        config.block.strategy = strategy;
    }
}

fn plan(run: &RunArgs, interval: u64) -> RunPlan {
    match run.iterations {
        Some(n) => RunPlan::bounded(n, interval),
        None => RunPlan::unbounded(interval),
    }
}

fn run_buffer(config: &SimConfig, run: &RunArgs) -> anyhow::Result<()> {
    let mut model = BufferOccupancyModel::new(&config.buffer)?;
    let format = config.report.format;
    let mut out = std::io::stdout().lock();
    if format == OutputFormat::Plain {
        write!(out, "{}", report::render_buffer_header(&model))?;
    }

    let stats = runner::run(
        &mut model,
        &plan(run, config.report.buffer_interval),
        |m| {
            match format {
                OutputFormat::Plain => write!(out, "{}", report::render_buffer_report(m))?,
                OutputFormat::Json => writeln!(out, "{}", ReportFrame::from_buffer(m).to_json_line()?)?,
            }
            Ok(())
        },
    )?;

    if format == OutputFormat::Plain {
        if let Some(wa) = stats.write_amplification {
            writeln!(out, "Write amplification: {wa:.6}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_block(config: &SimConfig, run: &RunArgs) -> anyhow::Result<()> {
    let mut model = BlockOccupancyModel::new(&config.block)?;
    let format = config.report.format;
    let mut out = std::io::stdout().lock();
    if format == OutputFormat::Plain {
        write!(out, "{}", report::render_block_header(&model))?;
    }

    let stats = runner::run(
        &mut model,
        &plan(run, config.report.block_interval),
        |m| {
            match format {
                OutputFormat::Plain => write!(out, "{}", report::render_block_histogram(m))?,
                OutputFormat::Json => writeln!(out, "{}", ReportFrame::from_block(m).to_json_line()?)?,
            }
            Ok(())
        },
    )?;

    if format == OutputFormat::Plain {
        if let Some(wa) = stats.write_amplification {
            writeln!(out, "Write amplification: {wa:.6}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_sweep(mut config: SimConfig, model: &SweepModel) -> anyhow::Result<()> {
    let args = match model {
        SweepModel::Buffer { sweep, strategy } => {
            if let Some(strategy) = *strategy {
                config.buffer.strategy = strategy;
            }
            if let Some(warmup) = sweep.warmup {
                config.buffer.warmup_iterations = warmup;
            }
            sweep
        }
        SweepModel::Block { sweep, strategy } => {
            if let Some(strategy) = *strategy {
                config.block.strategy = strategy;
            }
            if let Some(warmup) = sweep.warmup {
                config.block.warmup_iterations = warmup;
            }
            sweep
        }
    };
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if args.seeds == 0 {
        return Err(ConfigError::TooSmall {
            field: "seeds",
            min: 1,
            value: 0,
        }
        .into());
    }
    start(&config)?;

    let first = args.seed.unwrap_or(match model {
        SweepModel::Buffer { .. } => config.buffer.seed,
        SweepModel::Block { .. } => config.block.seed,
    });
    let seeds: Vec<u64> = (0..args.seeds).map(|i| first.wrapping_add(i)).collect();
    let threads = args.threads.unwrap_or_else(|| {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    });

    let summary = match model {
        SweepModel::Buffer { .. } => {
            let base = config.buffer.clone();
            runner::sweep(
                &seeds,
                threads,
                |seed| BufferOccupancyModel::new(&BufferConfig { seed, ..base.clone() }),
                args.iterations,
            )?
        }
        SweepModel::Block { .. } => {
            let base = config.block.clone();
            runner::sweep(
                &seeds,
                threads,
                |seed| BlockOccupancyModel::new(&BlockConfig { seed, ..base.clone() }),
                args.iterations,
            )?
        }
    };

    let mut out = std::io::stdout().lock();
    match config.report.format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string(&summary).context("serialize sweep")?)?;
        }
        OutputFormat::Plain => {
            for run in &summary.runs {
                let wa = run
                    .stats
                    .write_amplification
                    .map_or_else(|| "n/a".to_string(), |wa| format!("{wa:.6}"));
                writeln!(
                    out,
                    "seed {:>6}: average victim {:.4}, write amplification {wa}",
                    run.seed, run.stats.running_average_victim_index
                )?;
            }
            writeln!(
                out,
                "mean {:.4} min {:.4} max {:.4} over {} seeds",
                summary.mean_victim_index,
                summary.min_victim_index,
                summary.max_victim_index,
                summary.runs.len()
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
