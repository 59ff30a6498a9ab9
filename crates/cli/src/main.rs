//! `tickbar`: clean a directory of tick CSVs and aggregate them into OHLCV bars.
//!
//! Pipeline:
//!   1. load + clean every CSV batch in `--raw-dir` (parallel, per-file dedup)
//!   2. write the combined cleaned set to `--cleaned-dir`
//!   3. aggregate `[--start, --end)` into `--interval` bars and write them to
//!      `--ohlcv-dir`

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use clap::Parser;
use tickbar_aggregation::OhlcvAggregator;
use tickbar_core::{parse_window_timestamp, Config, Interval, RejectReason};
use tickbar_ingestion::{bars_file_name, cleaned_file_name, write_bars, BatchLoader, CsvDirSource};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tickbar",
    version,
    about = "Clean trade-tick CSV files and aggregate them into OHLCV bars"
)]
struct Cli {
    /// Directory holding the raw tick files
    #[arg(long)]
    raw_dir: PathBuf,

    /// Where to write the combined cleaned file (created if missing)
    #[arg(long)]
    cleaned_dir: Option<PathBuf>,

    /// Where to write the OHLCV file (created if missing)
    #[arg(long)]
    ohlcv_dir: Option<PathBuf>,

    /// Window start, e.g. "2024-09-16 10:00:00"
    #[arg(long)]
    start: String,

    /// Window end (exclusive), e.g. "2024-09-16 10:01:00"
    #[arg(long)]
    end: String,

    /// Bar width, e.g. 15s, 1m, 1h, 1d2h30m
    #[arg(long)]
    interval: String,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loader worker threads (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,

    /// Lowest accepted price
    #[arg(long)]
    min_price: Option<f64>,

    /// Highest accepted price
    #[arg(long)]
    max_price: Option<f64>,

    /// Input file extension
    #[arg(long)]
    extension: Option<String>,

    /// Skip the timestamp sort before bucketing (input must be in order)
    #[arg(long)]
    assume_sorted: bool,
}

/// Validated window and interval for one run.
#[derive(Debug)]
struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: String,
}

impl Cli {
    /// File config (or defaults) with command-line overrides applied.
    fn build_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(dir) = &self.cleaned_dir {
            config.output.cleaned_dir = dir.clone();
        }
        if let Some(dir) = &self.ohlcv_dir {
            config.output.ohlcv_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.loader.workers = workers;
        }
        if let Some(ext) = &self.extension {
            config.loader.extension = ext.clone();
        }
        if let Some(p) = self.min_price {
            config.cleaning.min_valid_price = p;
        }
        if let Some(p) = self.max_price {
            config.cleaning.max_valid_price = p;
        }
        if self.assume_sorted {
            config.aggregation.sort_by_timestamp = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn window(&self) -> anyhow::Result<Window> {
        let start = parse_window_timestamp(&self.start).context("invalid --start")?;
        let end = parse_window_timestamp(&self.end).context("invalid --end")?;
        if start >= end {
            bail!("start time must be before end time");
        }

        let interval = self.interval.trim();
        let parsed = Interval::parse(interval)
            .with_context(|| format!("enter an interval such as 15s, 1m or 1h (got {interval:?})"))?;
        if parsed.is_zero() {
            bail!("interval must be greater than zero");
        }

        Ok(Window {
            start,
            end,
            interval: interval.to_string(),
        })
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Outcome of a run, for the summary and for tests.
#[derive(Debug, Default)]
struct RunSummary {
    cleaned_rows: usize,
    cleaned_file: Option<PathBuf>,
    bars: usize,
    bars_file: Option<PathBuf>,
}

fn run(config: &Config, raw_dir: &Path, window: &Window) -> anyhow::Result<RunSummary> {
    if !raw_dir.is_dir() {
        bail!("the raw data directory {} does not exist", raw_dir.display());
    }

    let mut summary = RunSummary::default();

    let started = Instant::now();
    let source = CsvDirSource::with_extension(raw_dir, &config.loader.extension);
    let loader = BatchLoader::from_config(config);
    let report = loader.load_all(&source).context("loading raw data")?;
    println!(
        "Data loading and cleaning completed in {:.2} seconds.",
        started.elapsed().as_secs_f64()
    );

    for failure in &report.failed_batches {
        println!("Skipped {}: {}", failure.batch, failure.error);
    }
    for reason in RejectReason::ALL {
        let count = report.stats.count(reason);
        if count > 0 {
            println!("  removed {count} rows ({reason})");
        }
    }

    if report.records.is_empty() {
        println!("No data loaded. Exiting.");
        return Ok(summary);
    }
    summary.cleaned_rows = report.records.len();
    println!("Loaded and cleaned {} rows.", report.records.len());

    let cleaned_path = config
        .output
        .cleaned_dir
        .join(cleaned_file_name(chrono::Local::now().naive_local()));
    match loader.save_all(&report.records, &cleaned_path) {
        Ok(_) => {
            println!("Cleaned data saved to {}", cleaned_path.display());
            summary.cleaned_file = Some(cleaned_path);
        }
        Err(e) => tracing::warn!(error = %e, "cleaned data not written"),
    }

    let aggregator = OhlcvAggregator::from_config(&config.aggregation);
    let bars = aggregator.aggregate(&report.records, window.start, window.end, &window.interval)?;
    if bars.is_empty() {
        println!("No OHLCV data calculated. Exiting.");
        return Ok(summary);
    }
    summary.bars = bars.len();

    let bars_path = config
        .output
        .ohlcv_dir
        .join(bars_file_name(window.start, window.end, &window.interval));
    match write_bars(&bars, &bars_path) {
        Ok(_) => {
            println!("OHLCV data saved to {}", bars_path.display());
            summary.bars_file = Some(bars_path);
        }
        Err(e) => tracing::warn!(error = %e, "OHLCV data not written"),
    }

    Ok(summary)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.build_config()?;
    init_logging(&config.log_level);

    let window = cli.window()?;
    let summary = run(&config, &cli.raw_dir, &window)?;
    tracing::info!(
        cleaned_rows = summary.cleaned_rows,
        bars = summary.bars,
        "run finished"
    );
    Ok(())
}
