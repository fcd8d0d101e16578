use credit_risk_core::RiskCoreError;
use thiserror::Error;

/// Errors returned by the training pipeline.
///
/// None of these leave a model version behind; publication only happens
/// after a pipeline run succeeds.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("could not detect a target column; expected one of: {}", candidates.join(", "))]
    TargetNotFound { candidates: Vec<String> },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("training cancelled during {stage}")]
    Cancelled { stage: String },

    #[error(transparent)]
    Core(#[from] RiskCoreError),
}

impl From<csv::Error> for TrainerError {
    fn from(err: csv::Error) -> Self {
        TrainerError::Dataset(err.to_string())
    }
}

/// Result type for training operations
pub type Result<T> = std::result::Result<T, TrainerError>;
