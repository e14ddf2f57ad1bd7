//! Shortflow CLI: extract and transform commands.
//!
//! Commands:
//! - `extract`: fetch one day's short sale report and stage it for processing
//! - `transform`: score every staged file, upload outputs, archive the inputs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use shortflow_core::{HttpReportSource, LocalStore, TransformRegistry};
use shortflow_runner::{
    run_extract, run_transform, FileOutcome, PipelineConfig, TransformSummary, DEFAULT_ENDPOINT,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shortflow",
    about = "Shortflow: daily short sale balance pipeline"
)]
struct Cli {
    /// TOML config file. Defaults to reading the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the report for one date and stage it in `to_be_processed/`.
    Extract {
        /// Report endpoint under the base URL.
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Report date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Transform every staged file and archive the inputs.
    Transform {
        /// Print the run summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let store = LocalStore::new(&config.storage_root, config.bucket.clone());
    info!(
        bucket = %config.bucket,
        prefix = %config.prefix,
        root = %store.base_dir().display(),
        "shortflow starting"
    );

    match cli.command {
        Commands::Extract { endpoint, date } => run_extract_cmd(&config, &store, &endpoint, date),
        Commands::Transform { json } => run_transform_cmd(&config, &store, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => PipelineConfig::from_env().context("reading config from environment"),
    }
}

fn run_extract_cmd(
    config: &PipelineConfig,
    store: &LocalStore,
    endpoint: &str,
    date: Option<String>,
) -> Result<()> {
    let date = date
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--date must be YYYY-MM-DD")?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let source = HttpReportSource::new(config.base_url.clone())?;
    let outcome = run_extract(config, store, &source, endpoint, date)?;

    println!("Extracted {} rows for {}", outcome.rows, outcome.date);
    println!("  local: {}", outcome.local_path.display());
    match &outcome.key {
        Some(key) => println!("  staged: {key}"),
        None => println!("  staged: (skipped)"),
    }
    Ok(())
}

fn run_transform_cmd(config: &PipelineConfig, store: &LocalStore, json: bool) -> Result<()> {
    let registry = TransformRegistry::with_defaults();
    let summary = run_transform(config, store, &registry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &TransformSummary) {
    println!("Dataset:      {}", summary.dataset);
    println!("Run date:     {}", summary.run_date);
    println!("Staged:       {}", summary.staged.moved_count());
    println!("Transformed:  {}", summary.transformed_count());
    println!("Failed:       {}", summary.failed_count());
    println!("Archived:     {}", summary.archived.moved_count());

    for file in &summary.files {
        match file {
            FileOutcome::Transformed {
                input,
                rows,
                output_key,
                checksum,
            } => {
                let short = &checksum[..12.min(checksum.len())];
                println!("  ok    {input} -> {output_key} ({rows} rows, blake3 {short})");
            }
            FileOutcome::Failed { input, error } => println!("  FAIL  {input}: {error}"),
        }
    }
    for key in &summary.quarantined {
        println!("  quarantined {key}");
    }
}
