//! Error types for the model version manager

use credit_risk_core::RiskCoreError;
use thiserror::Error;

/// Errors that can occur while publishing, loading or activating versions
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An artifact is missing, unreadable or fails its hash check
    #[error("failed to load version {version}: {reason}")]
    ArtifactLoad { version: String, reason: String },

    /// Version id not present in the manifest
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// Nothing has been activated yet
    #[error("no active model version")]
    NoActiveVersion,

    /// Manifest is unreadable or an operation on it is invalid
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Model/schema validation or pairing failure
    #[error(transparent)]
    Core(#[from] RiskCoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub(crate) fn artifact(version: &str, reason: impl Into<String>) -> Self {
        RegistryError::ArtifactLoad {
            version: version.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
