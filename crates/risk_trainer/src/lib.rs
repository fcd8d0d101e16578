//! Credit risk trainer - schema-detecting offline GBDT trainer
//!
//! Turns a historical loan table into a fitted feature schema plus a
//! binary logistic GBDT model. Runs are deterministic for a fixed seed
//! and dataset.

pub mod cart;
pub mod dataset;
pub mod detection;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod trainer;

use std::path::Path;

pub use dataset::TabularDataset;
pub use detection::{partition_columns, ColumnPartition, TargetDetector, TARGET_CANDIDATES};
pub use deterministic::{stratified_split, LcgRng, SplitIndices, SplitTieBreaker};
pub use errors::{Result, TrainerError};
pub use normalize::{NormalizedTarget, TargetNormalizer};
pub use pipeline::{TrainingConfig, TrainingOutcome, TrainingPipeline, TrainingReport};
pub use trainer::{CancellationFlag, GbdtConfig, GbdtTrainer};

/// Train directly from a CSV file
pub fn train_from_csv(
    path: &Path,
    target_hint: Option<&str>,
    config: TrainingConfig,
    decision_threshold: f64,
) -> Result<TrainingOutcome> {
    let dataset = TabularDataset::from_csv_path(path)?;
    TrainingPipeline::new(config, decision_threshold).run(
        &dataset,
        target_hint,
        &CancellationFlag::new(),
    )
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
