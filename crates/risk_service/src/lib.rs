//! Loan default prediction service
//!
//! - `service`: single and batch prediction, training, reload and version management
//! - `explain`: two-stage explanations (AI backend, then rules)
//! - `rules`: deterministic narrative and remediation text
//! - `llm`: OpenAI-compatible completion client
//! - `config`: TOML + environment configuration

pub mod config;
pub mod errors;
pub mod explain;
pub mod llm;
pub mod rules;
pub mod service;
pub mod types;

pub use config::{
    parse_bool, BatchConfig, ImputationConfig, LlmConfig, RegistryConfig, ServiceConfig,
};
pub use errors::{ExplanationBackendError, Result, ServiceError};
pub use explain::{Explanation, ExplanationBackend, ExplanationGenerator, ExplanationSource};
pub use llm::LlmClient;
pub use service::RiskService;
pub use types::{BatchItem, BatchResponse, ErrorEntry, PredictionResponse};

pub use credit_risk_core::{FieldValue, LoanRecord, RiskLevel, RiskThresholds};
pub use credit_risk_registry::{ReloadResult, VersionSummary};
pub use credit_risk_trainer::{TabularDataset, TrainingReport};

/// Service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
