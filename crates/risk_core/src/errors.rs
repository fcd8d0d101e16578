//! Error types for the risk core

use thiserror::Error;

/// Errors that can occur while imputing, encoding or scoring a record
#[derive(Error, Debug)]
pub enum RiskCoreError {
    /// A supplied field value cannot be coerced to what the schema expects
    #[error("Invalid value for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Encoder schema and loaded model disagree
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Model structure is inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RiskCoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskCoreError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the serving bundle
    pub fn is_validation(&self) -> bool {
        matches!(self, RiskCoreError::Validation { .. })
    }
}

/// Result type for risk core operations
pub type Result<T> = std::result::Result<T, RiskCoreError>;
