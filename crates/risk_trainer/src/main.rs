//! Loan default model trainer CLI
//!
//! Trains a GBDT model from a CSV table and publishes it as a new
//! immutable version in a model directory.

use anyhow::{Context, Result};
use clap::Parser;
use credit_risk_core::RiskThresholds;
use credit_risk_registry::VersionStore;
use credit_risk_trainer::{
    CancellationFlag, GbdtConfig, TabularDataset, TrainingConfig, TrainingPipeline,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "risk-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and publish a loan default GBDT model", long_about = None)]
struct Args {
    /// Input CSV dataset path (header row required)
    #[arg(short, long)]
    input: PathBuf,

    /// Model directory to publish into
    #[arg(short, long, default_value = "models")]
    model_dir: PathBuf,

    /// Target column name (detected when omitted)
    #[arg(short, long)]
    target: Option<String>,

    /// Activate the new version after publishing
    #[arg(long)]
    activate: bool,

    /// Number of boosting trees
    #[arg(long, default_value = "100")]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "5")]
    min_samples_leaf: usize,

    /// Learning rate
    #[arg(long, default_value = "0.1")]
    learning_rate: f64,

    /// Share of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_ratio: f64,

    /// Seed for the stratified split
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Decision threshold the metrics are computed with
    #[arg(long, default_value = "0.5")]
    decision_threshold: f64,

    /// Minimum rows after target cleaning
    #[arg(long, default_value = "100")]
    min_rows: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Credit risk trainer v{}", env!("CARGO_PKG_VERSION"));

    RiskThresholds {
        decision_threshold: args.decision_threshold,
        ..RiskThresholds::default()
    }
    .validate()
    .context("Invalid decision threshold")?;

    info!("Loading dataset from: {}", args.input.display());
    let dataset = TabularDataset::from_csv_path(&args.input).context("Failed to load dataset")?;
    info!(
        "Loaded {} rows with {} columns",
        dataset.len(),
        dataset.columns.len()
    );

    let config = TrainingConfig {
        test_ratio: args.test_ratio,
        seed: args.seed,
        min_rows: args.min_rows,
        gbdt: GbdtConfig {
            num_trees: args.trees,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            learning_rate: args.learning_rate,
            ..GbdtConfig::default()
        },
        ..TrainingConfig::default()
    };

    let outcome = TrainingPipeline::new(config, args.decision_threshold)
        .run(&dataset, args.target.as_deref(), &CancellationFlag::new())
        .context("Training failed")?;

    let store = VersionStore::open(&args.model_dir).context("Failed to open model directory")?;
    let version = store
        .publish(&outcome.to_new_version())
        .context("Failed to publish model version")?;

    let mut report = outcome.report;
    report.version_id = Some(version.version_id.clone());

    if args.activate {
        store
            .activate(&version.version_id)
            .context("Failed to activate model version")?;
    }

    info!("Training completed");
    info!("  Version: {}", version.version_id);
    info!("  Target: {}", report.target);
    info!(
        "  Accuracy {:.4}  AUC {:.4}  F1 {:.4}",
        report.metrics.accuracy, report.metrics.auc_roc, report.metrics.f1
    );
    info!("  Active: {}", args.activate);

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
