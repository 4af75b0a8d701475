//! FX rate forecasting CLI.
//!
//! # Usage
//!
//! ```bash
//! # Check an input file against the engine's requirements
//! fx-forecast validate --data data/rates.csv
//!
//! # Forecast 30 days with every configured model
//! fx-forecast forecast --data data/rates.csv --config config/default.toml
//!
//! # Record this week's predictions and compare with previous weeks
//! fx-forecast forecast --data data/rates.csv --predictions data/predictions.csv --save
//!
//! # Walk-forward backtest, writing every record as CSV
//! fx-forecast backtest --data data/rates.csv --output results/backtest.csv
//!
//! # Score the latest recorded week against actual rates
//! fx-forecast review --data data/rates.csv --predictions data/predictions.csv
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use fx_forecast::forecast::{
    compare_weeks, replace_week, review_week, weekly_records, PredictionRecord, WeeklyComparison,
    WeeklyConsensus,
};
use fx_forecast::metrics::ErrorCalculator;
use fx_forecast::{
    DataIntegrityValidator, EngineConfig, EnsembleSummary, ForecastRun, LagFeatureBuilder,
    RateSeries,
};

const SEPARATOR: &str = "============================================================";

/// FX rate forecasting and walk-forward backtesting.
#[derive(Parser)]
#[command(name = "fx-forecast")]
#[command(about = "Recursive multi-model FX rate forecasting and walk-forward backtesting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an input rate file
    Validate {
        /// Path to rate CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Forecast future rates with every configured model
    Forecast {
        /// Path to rate CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Override the configured horizon
        #[arg(long)]
        horizon: Option<usize>,

        /// Weekly prediction history CSV (read for comparison)
        #[arg(short, long)]
        predictions: Option<PathBuf>,

        /// Append this week's predictions to the history file
        #[arg(long, requires = "predictions")]
        save: bool,

        /// Week start for saved predictions (YYYY-MM-DD, default today)
        #[arg(long)]
        week_start: Option<String>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Run a walk-forward backtest
    Backtest {
        /// Path to rate CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Override the first training prefix length
        #[arg(long)]
        start_size: Option<usize>,

        /// Override the maximum number of evaluation steps
        #[arg(long)]
        max_steps: Option<usize>,

        /// Evaluate steps on one thread
        #[arg(long)]
        sequential: bool,

        /// Write backtest records to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Review the latest recorded week against actual rates
    Review {
        /// Path to rate CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Weekly prediction history CSV
        #[arg(short, long)]
        predictions: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fx_forecast=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Validate { data } => cmd_validate(&config, &data),
        Commands::Forecast {
            data,
            horizon,
            predictions,
            save,
            week_start,
            json,
        } => {
            let mut config = config;
            if let Some(h) = horizon {
                config.forecast.horizon = h;
            }
            let week_start = match week_start {
                Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .context("Invalid week start date format")?,
                None => Local::now().date_naive(),
            };
            cmd_forecast(&config, &data, predictions.as_deref(), save, week_start, json)
        }
        Commands::Backtest {
            data,
            start_size,
            max_steps,
            sequential,
            output,
            json,
        } => {
            let mut config = config;
            if let Some(s) = start_size {
                config.backtest.start_size = s;
            }
            if let Some(m) = max_steps {
                config.backtest.max_steps = m;
            }
            if sequential {
                config.backtest.parallel = false;
            }
            cmd_backtest(&config, &data, output.as_deref(), json)
        }
        Commands::Review { data, predictions } => cmd_review(&config, &data, &predictions),
    }
}

fn load_series(config: &EngineConfig, path: &Path) -> Result<RateSeries> {
    let series = config
        .loader()
        .load_path(path)
        .with_context(|| format!("Failed to load rates from {}", path.display()))?;
    info!("Loaded {} observations from {}", series.len(), path.display());
    Ok(series)
}

fn cmd_validate(config: &EngineConfig, data: &Path) -> Result<()> {
    let series = load_series(config, data)?;
    let report = DataIntegrityValidator::new(config.lags.clone()).validate(&series);

    println!("{}", SEPARATOR);
    println!("DATA VALIDATION");
    println!("{}", SEPARATOR);
    println!("{}", report.summary());
    println!();
    for check in &report.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{}] {}: {}", status, check.name, check.message);
        if let Some(details) = &check.details {
            println!("         {}", details);
        }
    }

    if !report.all_passed() {
        bail!("{} validation checks failed", report.failed_checks().len());
    }
    Ok(())
}

fn cmd_forecast(
    config: &EngineConfig,
    data: &Path,
    predictions: Option<&Path>,
    save: bool,
    week_start: NaiveDate,
    json: bool,
) -> Result<()> {
    let series = load_series(config, data)?;
    let report = DataIntegrityValidator::new(config.lags.clone()).validate(&series);
    for failed in report.failed_checks() {
        warn!("Validation {}: {}", failed.name, failed.message);
    }

    let current = series
        .last()
        .map(|o| o.rate_f64())
        .context("Rate file has no observations")?;

    let table = LagFeatureBuilder::new(config.lags.clone()).build(&series)?;
    let registry = config.registry()?;
    let run = config.forecaster()?.run(&registry, &table)?;
    let summary = config.aggregator()?.aggregate_run(&run, current)?;

    let history = match predictions {
        Some(path) if path.exists() => read_predictions(path)?,
        _ => Vec::new(),
    };
    let comparison = compare_weeks(
        &summary,
        &weekly_consensus(&history),
        Some(week_start),
        config.outlook.lookback_weeks,
    );

    if json {
        let output = serde_json::json!({
            "run": run,
            "summary": summary,
            "comparison": comparison,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_forecast(&run, &summary, &comparison);
    }

    if save {
        if let Some(path) = predictions {
            let records = weekly_records(&summary, week_start);
            let saved = records.len();
            write_predictions(path, &replace_week(history, records))?;
            info!("Saved {} weekly predictions to {}", saved, path.display());
        }
    }
    Ok(())
}

fn print_forecast(run: &ForecastRun, summary: &EnsembleSummary, comparison: &WeeklyComparison) {
    println!("{}", SEPARATOR);
    println!("FORECAST SUMMARY (day {})", summary.horizon_index + 1);
    println!("{}", SEPARATOR);
    if let Some(date) = summary.date {
        println!("Target date:      {}", date);
    }
    println!("Current rate:     {:.4}", summary.reference_rate);
    for (model, value) in &summary.per_model {
        println!("  {:<22} {:.4}", model, value);
    }
    println!();
    println!(
        "Consensus:        {:.4} ({:+.4}, {:+.2}%)",
        summary.consensus, summary.change, summary.pct_change
    );
    println!("Best case:        {:.4}", summary.best_case);
    println!("Worst case:       {:.4}", summary.worst_case);
    println!("Spread:           {:.4}", summary.spread());
    println!("Outlook:          the currency is expected to {}", summary.outlook);
    println!(
        "Vs last week:     {:+.4} ({:+.2}%) from {:.4}",
        comparison.change_vs_previous, comparison.pct_vs_previous, comparison.previous
    );
    if let (Some(change), Some(pct)) = (comparison.trend_change, comparison.trend_pct) {
        println!(
            "{}-week trend:     {:+.4} ({:+.2}%)",
            comparison.trend_weeks, change, pct
        );
    }

    if summary.is_partial() {
        println!();
        println!(
            "WARNING: only {} of {} models contributed",
            summary.contributing_models(),
            summary.expected_models
        );
        for failure in &run.failures {
            println!("  {}: {}", failure.model, failure.message);
        }
    }
}

fn read_predictions(path: &Path) -> Result<Vec<PredictionRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open predictions {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row.context("Invalid prediction record")?);
    }
    Ok(records)
}

/// Rewrite the predictions file with `records`.
fn write_predictions(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to write predictions {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One consensus per recorded week.
fn weekly_consensus(records: &[PredictionRecord]) -> Vec<WeeklyConsensus> {
    let mut weeks: Vec<WeeklyConsensus> = Vec::new();
    for record in records {
        if !weeks.iter().any(|w| w.week_start == record.week_start) {
            weeks.push(WeeklyConsensus {
                week_start: record.week_start,
                consensus: record.consensus,
            });
        }
    }
    weeks
}

fn cmd_backtest(config: &EngineConfig, data: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let series = load_series(config, data)?;
    let table = LagFeatureBuilder::new(config.lags.clone()).build(&series)?;
    let registry = config.registry()?;
    let backtester = config.backtester();

    let steps = config.backtest.evaluation_range(table.len()).len();
    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message("steps");
    let on_progress = |_done: usize, _total: usize| pb.inc(1);

    let start = Instant::now();
    let result = backtester.run_with_progress(&table, &registry, Some(&on_progress))?;
    pb.finish_and_clear();
    info!(
        "Backtest of {} steps finished in {:.1}s",
        result.steps(),
        start.elapsed().as_secs_f64()
    );

    let stats = ErrorCalculator::for_result(&result);

    if json {
        let output = serde_json::json!({
            "steps": result.steps(),
            "first_date": result.records.first().map(|r| r.date),
            "last_date": result.records.last().map(|r| r.date),
            "models": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", SEPARATOR);
        println!(
            "WALK-FORWARD BACKTEST ({} steps, rows {}..{})",
            result.steps(),
            result.first_index,
            result.end_index
        );
        println!("{}", SEPARATOR);
        print!("{}", ErrorCalculator::summary(&stats));

        let window = result.config.window;
        for model in &result.models {
            if let Some(last) = ErrorCalculator::rolling_mae(&result.records, model, window).last() {
                println!(
                    "  {:<20} last {}-step MAE: {:.4} ({} to {})",
                    model, window, last.mae, last.start_date, last.end_date
                );
            }
        }
    }

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in &result.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!("Wrote {} records to {}", result.records.len(), path.display());
    }
    Ok(())
}

fn cmd_review(config: &EngineConfig, data: &Path, predictions: &Path) -> Result<()> {
    let series = load_series(config, data)?;
    let records = read_predictions(predictions)?;
    let review = review_week(&records, &series)?;

    println!("{}", SEPARATOR);
    println!("WEEKLY REVIEW | {} - {}", review.week_start, review.week_end);
    println!("{}", SEPARATOR);
    match review.actual_rate {
        Some(actual) => println!("Actual end-of-week rate: {:.4}", actual),
        None => println!("No actual rate for {} yet", review.week_end),
    }
    println!();
    for p in &review.predictions {
        match p.error {
            Some(e) => println!("  {:<22} predicted {:.4} | error {:+.4}", p.model, p.predicted_rate, e),
            None => println!("  {:<22} predicted {:.4}", p.model, p.predicted_rate),
        }
    }
    println!();
    match review.consensus_error {
        Some(e) => println!("Consensus: {:.4} (error {:+.4})", review.consensus, e),
        None => println!("Consensus: {:.4}", review.consensus),
    }
    Ok(())
}
