//! Credit risk command-line entry point
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use credit_risk_service::{LoanRecord, RiskService, ServiceConfig, TabularDataset};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "credit-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Loan default prediction with explanations and versioned models", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model directory (overrides configuration)
    #[arg(short, long, global = true)]
    model_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one application (JSON object; `-` reads stdin)
    Predict {
        input: PathBuf,
        /// Skip the explanation stage
        #[arg(long)]
        no_explanation: bool,
    },
    /// Score many applications (JSON array or CSV with a header row)
    Batch {
        input: PathBuf,
        /// Generate explanations for every row
        #[arg(long)]
        explain: bool,
    },
    /// Train and publish a new version from a CSV dataset
    Train {
        input: PathBuf,
        /// Target column name (detected when omitted)
        #[arg(short, long)]
        target: Option<String>,
        /// Activate and load the new version
        #[arg(long)]
        activate: bool,
    },
    /// Load the manifest's current version
    Reload,
    /// Make a published version current
    Activate { version_id: String },
    /// Return to the previously active version
    Rollback,
    /// List published versions
    Versions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config =
        ServiceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model_dir) = cli.model_dir {
        config.registry.model_dir = model_dir;
    }

    info!(
        "Credit risk service v{} (models in {})",
        env!("CARGO_PKG_VERSION"),
        config.registry.model_dir.display()
    );
    let service = RiskService::open(config).context("Failed to start service")?;

    match cli.command {
        Command::Predict {
            input,
            no_explanation,
        } => {
            let record: LoanRecord = serde_json::from_str(&read_input(&input)?)
                .context("Input must be a JSON object of field values")?;
            let response = service.predict_single(record, !no_explanation).await?;
            print_json(&response)
        }
        Command::Batch { input, explain } => {
            let records = read_batch(&input)?;
            let response = service.predict_batch(records, explain).await?;
            print_json(&response)
        }
        Command::Train {
            input,
            target,
            activate,
        } => {
            let dataset =
                TabularDataset::from_csv_path(&input).context("Failed to load dataset")?;
            let report = service.train(dataset, target).await?;
            if activate {
                if let Some(version_id) = &report.version_id {
                    let reload = service.activate_version(version_id).await?;
                    if !reload.success {
                        bail!(
                            "activated {version_id} but reload failed: {}",
                            reload.error.unwrap_or_default()
                        );
                    }
                }
            }
            print_json(&report)
        }
        Command::Reload => print_json(&service.reload_model().await),
        Command::Activate { version_id } => {
            print_json(&service.activate_version(&version_id).await?)
        }
        Command::Rollback => print_json(&service.rollback().await?),
        Command::Versions => print_json(&service.list_versions()?),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn read_batch(path: &Path) -> Result<Vec<LoanRecord>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        let dataset = TabularDataset::from_csv_path(path).context("Failed to load CSV batch")?;
        return Ok((0..dataset.len()).map(|row| dataset.record(row)).collect());
    }
    serde_json::from_str(&read_input(path)?).context("Batch input must be a JSON array of objects")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
