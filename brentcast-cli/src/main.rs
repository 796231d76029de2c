//! brentcast CLI: pipeline run, predictions, series queries, artifact status.
//!
//! Commands:
//! - `run`: extract, refine, train and persist artifacts
//! - `predict`: forecast value for one or more target dates
//! - `series`: refined rows within a date range
//! - `status`: which artifacts exist, watermark, last run manifest

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brentcast_core::data::ArtifactStore;
use brentcast_runner::{
    run_pipeline, series_range, source_for, warehouse_for, PipelineConfig, Prediction,
    PredictionService, RunSummary,
};

#[derive(Parser)]
#[command(
    name = "brentcast",
    about = "brentcast: Brent crude price scraping, refinement and forecasting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Common {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Artifact directory (overrides the config file).
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline: extract, refine, split, fit and persist.
    Run {
        #[command(flatten)]
        common: Common,

        /// Read the source page from a saved HTML file instead of the network.
        #[arg(long)]
        offline_html: Option<PathBuf>,

        /// First training day (YYYY-MM-DD), overrides the config file.
        #[arg(long)]
        start_train_date: Option<String>,

        /// Skip the warehouse load even if one is configured.
        #[arg(long, default_value_t = false)]
        no_warehouse: bool,
    },
    /// Forecast the price on one or more target dates.
    Predict {
        #[command(flatten)]
        common: Common,

        /// Target date (YYYY-MM-DD). Repeatable.
        #[arg(long = "date", required = true)]
        dates: Vec<String>,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print refined rows within an inclusive date range.
    Series {
        #[command(flatten)]
        common: Common,

        /// First date (YYYY-MM-DD), open when omitted.
        #[arg(long)]
        from: Option<String>,

        /// Last date (YYYY-MM-DD), open when omitted.
        #[arg(long)]
        to: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Report artifacts present, watermark and last run.
    Status {
        #[command(flatten)]
        common: Common,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("brentcast=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            common,
            offline_html,
            start_train_date,
            no_warehouse,
        } => run_cmd(&common, offline_html.as_deref(), start_train_date, no_warehouse),
        Commands::Predict {
            common,
            dates,
            json,
        } => predict_cmd(&common, &dates, json),
        Commands::Series {
            common,
            from,
            to,
            json,
        } => series_cmd(&common, from, to, json),
        Commands::Status { common } => status_cmd(&common),
    }
}

fn load_config(common: &Common) -> Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &common.artifacts_dir {
        config.artifacts.dir = dir.clone();
    }
    Ok(config)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        Ok(d) => Ok(d),
        Err(e) => bail!("invalid date '{s}' (expected YYYY-MM-DD): {e}"),
    }
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

fn run_cmd(
    common: &Common,
    offline_html: Option<&Path>,
    start_train_date: Option<String>,
    no_warehouse: bool,
) -> Result<()> {
    let mut config = load_config(common)?;
    if let Some(start) = parse_opt_date(start_train_date)? {
        config.series.start_train_date = start;
    }
    if no_warehouse {
        config.warehouse = None;
    }

    let source = source_for(&config, offline_html)?;
    let warehouse = warehouse_for(&config)?;
    let summary = run_pipeline(&config, source.as_ref(), warehouse.as_deref())?;

    print_run_summary(&summary);
    Ok(())
}

fn predict_cmd(common: &Common, dates: &[String], json: bool) -> Result<()> {
    let config = load_config(common)?;
    let targets = dates
        .iter()
        .map(|d| parse_date(d))
        .collect::<Result<Vec<_>>>()?;

    let service = PredictionService::from_config(&config)?;
    info!(targets = targets.len(), "answering prediction requests");
    let results = service.predict_many(&targets);

    let mut answered: Vec<Prediction> = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(p) => answered.push(p),
            Err(e) => {
                eprintln!("Error for {target}: {e}");
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&answered)?);
    } else {
        print_predictions(&answered);
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn series_cmd(common: &Common, from: Option<String>, to: Option<String>, json: bool) -> Result<()> {
    let config = load_config(common)?;
    let store = ArtifactStore::new(&config.artifacts.dir);
    let rows = series_range(&store, parse_opt_date(from)?, parse_opt_date(to)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No rows in range.");
        return Ok(());
    }
    println!("{:<12} {:>10}", "Date", "Price");
    println!("{}", "-".repeat(23));
    for p in &rows {
        println!("{:<12} {:>10.2}", p.date.to_string(), p.value);
    }
    println!();
    println!("{} row(s)", rows.len());
    Ok(())
}

fn status_cmd(common: &Common) -> Result<()> {
    let config = load_config(common)?;
    let status = ArtifactStore::new(&config.artifacts.dir).status();
    let mark = |present: bool| if present { "present" } else { "missing" };

    println!("Artifacts: {}", status.dir.display());
    println!("  raw snapshot:     {}", mark(status.raw));
    println!("  refined snapshot: {}", mark(status.refined));
    println!("  model:            {}", mark(status.model));
    match status.watermark {
        Some(wm) => println!("  watermark:        {wm}"),
        None => println!(
            "  watermark:        unreadable (predictions fall back to {} day(s))",
            config.prediction.fallback_horizon_days
        ),
    }

    if let Some(m) = status.manifest {
        println!();
        println!("=== Last Run ===");
        println!("Run at:         {}", m.run_at.format("%Y-%m-%d %H:%M:%S"));
        println!("Source:         {}", m.source);
        println!("Series:         {}", m.series_id);
        println!("Raw rows:       {}", m.raw_rows);
        println!("Refined rows:   {} (from {})", m.refined_rows, m.first_date);
        println!("Training:       {} rows from {}", m.train_rows, m.train_start);
        println!("Model:          {}", m.model_kind);
        println!("Data hash:      {}", short_hash(&m.data_hash));
    }
    Ok(())
}

/// First 16 characters of a manifest hash; safe on hand-edited text.
fn short_hash(hash: &str) -> String {
    hash.chars().take(16).collect()
}

fn print_run_summary(summary: &RunSummary) {
    let m = &summary.manifest;
    println!();
    println!("=== Pipeline Run ===");
    println!("Source:         {}", m.source);
    println!("Raw rows:       {}", m.raw_rows);
    println!("Refined rows:   {} (from {})", m.refined_rows, m.first_date);
    println!("Training rows:  {} (from {})", m.train_rows, m.train_start);
    println!("Watermark:      {}", m.watermark);
    println!("Model:          {}", m.model_kind);
    if let Some(load) = &summary.warehouse {
        println!("Warehouse:      {} (job {})", load.destination, load.job_id);
    }
    println!("Artifacts saved to: {}", summary.artifacts_dir.display());
}

fn print_predictions(predictions: &[Prediction]) {
    if predictions.is_empty() {
        return;
    }
    println!(
        "{:<12} {:<12} {:>10} {:>10} {:>10} {:>8}  {}",
        "Target", "Row", "Forecast", "Lower", "Upper", "Horizon", "Anchor"
    );
    println!("{}", "-".repeat(86));
    let bound = |b: Option<f64>| b.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    for p in predictions {
        println!(
            "{:<12} {:<12} {:>10.2} {:>10} {:>10} {:>8}  {}",
            p.target.to_string(),
            p.forecast_date.to_string(),
            p.value,
            bound(p.lower),
            bound(p.upper),
            p.horizon.days,
            p.horizon.source
        );
    }
}
