//! Command line front end: detect patterns in a CSV, generate synthetic data, list parameters.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cuphandle::{
    config::DetectorConfig,
    control::ScanControl,
    params::Parameterized,
    report::{self, ReportOptions},
    synthetic::{self, SyntheticConfig},
    EngineBuilder,
};

#[derive(Parser)]
#[command(name = "cuphandle")]
#[command(about = "Cup and Handle pattern detector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a candle CSV and write a pattern report
    Detect {
        /// Candle CSV with open_time,open,high,low,close,volume
        #[arg(long)]
        input: PathBuf,

        /// Detector configuration (TOML); defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "report.csv")]
        report: PathBuf,

        /// Maximum number of report rows (0 = unlimited)
        #[arg(long, default_value_t = 30)]
        max_patterns: usize,

        /// Report valid patterns only
        #[arg(long)]
        valid_only: bool,

        /// Abort the scan after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Generate a synthetic candle CSV with injected patterns
    Synth {
        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 10_081)]
        candles: usize,

        #[arg(long, default_value_t = 30)]
        patterns: usize,
    },

    /// Print the tunable detector parameters
    Params,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cuphandle={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Detect {
            input,
            config,
            report,
            max_patterns,
            valid_only,
            timeout_secs,
        } => detect(
            input,
            config,
            report,
            ReportOptions {
                max_patterns: (max_patterns > 0).then_some(max_patterns),
                valid_only,
            },
            timeout_secs,
        ),
        Commands::Synth {
            output,
            seed,
            candles,
            patterns,
        } => synth(output, seed, candles, patterns),
        Commands::Params => {
            print_params();
            Ok(())
        }
    }
}

fn detect(
    input: PathBuf,
    config: Option<PathBuf>,
    report_path: PathBuf,
    options: ReportOptions,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            DetectorConfig::from_toml_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };
    let engine = EngineBuilder::new().config(config).build()?;

    let bars = report::read_bars_file(&input)
        .with_context(|| format!("Failed to load candles from {}", input.display()))?;
    tracing::info!(candles = bars.len(), input = %input.display(), "candles loaded");

    let control = match timeout_secs {
        Some(secs) => ScanControl::unbounded().with_timeout(Duration::from_secs(secs)),
        None => ScanControl::unbounded(),
    };
    let patterns = engine.scan_with(&bars, &control).context("Scan failed")?;

    let valid = patterns.iter().filter(|p| p.is_valid()).count();
    tracing::info!(
        total = patterns.len(),
        valid,
        invalid = patterns.len() - valid,
        "detection complete"
    );

    let written = report::write_report_file(&report_path, &patterns, options)
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    println!(
        "{} patterns detected ({valid} valid), {written} rows written to {}",
        patterns.len(),
        report_path.display()
    );
    Ok(())
}

fn synth(output: PathBuf, seed: u64, candles: usize, patterns: usize) -> anyhow::Result<()> {
    let config = SyntheticConfig {
        seed,
        total_candles: candles,
        num_patterns: patterns,
        ..SyntheticConfig::default()
    };
    let series = synthetic::generate(&config)?;

    report::write_bars_file(&output, &series.bars)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "{} candles with {} injected patterns written to {}",
        series.bars.len(),
        series.patterns.len(),
        output.display()
    );
    for p in &series.patterns {
        tracing::debug!(
            start = p.start_idx,
            cup_end = p.cup_end(),
            handle_end = p.handle_end(),
            "injected pattern"
        );
    }
    Ok(())
}

fn print_params() {
    println!("{:<26} {:<8} {:>8}  {:<22} description", "name", "type", "default", "range");
    for meta in DetectorConfig::param_meta() {
        let sweep = meta.sweep;
        println!(
            "{:<26} {:<8} {:>8}  {:<22} {}",
            meta.name,
            format!("{:?}", meta.param_type),
            meta.default,
            format!("{}..={} step {}", sweep.min, sweep.max, sweep.step),
            meta.description
        );
    }
}
