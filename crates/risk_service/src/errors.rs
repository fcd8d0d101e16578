//! Service error types

use credit_risk_core::RiskCoreError;
use credit_risk_registry::RegistryError;
use credit_risk_trainer::TrainerError;
use thiserror::Error;

/// Errors surfaced to service callers
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no model is loaded; train and activate a version, then reload")]
    ModelNotLoaded,

    #[error("serving blocked for version {0} until a successful reload")]
    ServingBlocked(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error(transparent)]
    Training(#[from] TrainerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RiskCoreError> for ServiceError {
    fn from(err: RiskCoreError) -> Self {
        match err {
            RiskCoreError::Validation { .. } => ServiceError::Validation(err.to_string()),
            RiskCoreError::SchemaMismatch(reason) => ServiceError::SchemaMismatch(reason),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("background task failed: {err}"))
    }
}

/// Failures of the AI explanation stage. Always recovered by the
/// rule-based stage; never returned to service callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExplanationBackendError {
    #[error("AI explanations disabled")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out")]
    Timeout,
}

impl From<reqwest::Error> for ExplanationBackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExplanationBackendError::Timeout
        } else {
            ExplanationBackendError::Http(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for ExplanationBackendError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ExplanationBackendError::Timeout
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
