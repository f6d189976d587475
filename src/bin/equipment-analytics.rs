// src/bin/equipment-analytics.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use equipment_analytics::config::AnalyticsConfig;
use equipment_analytics::execution::{ExecutionEngine, LogExecutionObserver};
use equipment_analytics::ingestion::{IngestionSeverity, LogObserver};
use equipment_analytics::report::{format::format_timestamp, pdf_file_name};
use equipment_analytics::store::{DatasetStore, DirectoryDatasetStore};
use equipment_analytics::types::DatasetId;
use equipment_analytics::EquipmentAnalytics;

#[derive(Parser, Debug)]
#[command(name = "equipment-analytics", version, about = "Ingest equipment CSV files and report on them")]
struct Cli {
    /// Directory holding stored datasets.
    #[arg(long, default_value = "datasets", global = true)]
    store_dir: PathBuf,

    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse, aggregate and store a CSV upload; prints the new dataset id.
    Ingest { csv: PathBuf },
    /// List stored datasets, newest first.
    History {
        /// Number of entries to show (defaults to `history_limit`).
        #[arg(long)]
        limit: Option<usize>,
        /// Show every stored dataset.
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },
    /// Print the JSON summary of a dataset.
    Summary { id: String },
    /// Write the PDF report of a dataset.
    Pdf {
        id: String,
        /// Output path (defaults to `report_<id>.pdf`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalyticsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };

    let store = DirectoryDatasetStore::open(&cli.store_dir)
        .with_context(|| format!("opening store {}", cli.store_dir.display()))?;
    let engine = ExecutionEngine::new(config.execution_options())
        .with_observer(Arc::new(LogExecutionObserver));
    let app = EquipmentAnalytics::with_engine(&config, Arc::new(store), Arc::new(engine))
        .with_observer(Arc::new(LogObserver), IngestionSeverity::Critical);

    match cli.command {
        Commands::Ingest { csv } => ingest(&app, &csv),
        Commands::History { limit, all } => history(&app, &config, limit, all),
        Commands::Summary { id } => summary(&app, &id),
        Commands::Pdf { id, output } => pdf(&app, &id, output),
    }
}

fn ingest(app: &EquipmentAnalytics, path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let outcome = app
        .ingest(&file_name, &bytes)
        .with_context(|| format!("ingesting {file_name}"))?;
    for skipped in &outcome.skipped {
        eprintln!("skipped line {}: {}", skipped.line, skipped.reason);
    }
    println!("{}", outcome.id);
    Ok(())
}

fn history(
    app: &EquipmentAnalytics,
    config: &AnalyticsConfig,
    limit: Option<usize>,
    all: bool,
) -> Result<()> {
    let entries = if all {
        let mut all = app.history()?;
        all.reverse();
        all
    } else {
        app.store()
            .recent(limit.unwrap_or(config.history_limit))?
    };
    for entry in entries {
        println!(
            "{}\t{}\t{}",
            entry.id,
            format_timestamp(&entry.uploaded_at),
            entry.file_name
        );
    }
    Ok(())
}

fn summary(app: &EquipmentAnalytics, raw_id: &str) -> Result<()> {
    let id: DatasetId = raw_id.parse()?;
    let payload = app.summary(&id)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn pdf(app: &EquipmentAnalytics, raw_id: &str, output: Option<PathBuf>) -> Result<()> {
    let id: DatasetId = raw_id.parse()?;
    let bytes = app.pdf(&id)?;
    let output = output.unwrap_or_else(|| PathBuf::from(pdf_file_name(&id)));
    fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}
