//! Loan default risk core
//!
//! Turns a possibly incomplete loan application into a validated feature
//! vector, a default probability, a risk tier and per-field attributions.
//!
//! Modules:
//! - `record`: Tagged raw input values
//! - `schema`: Feature schema registry (one per model version)
//! - `imputation`: Derived / historical / default filling of missing fields
//! - `encoder`: Scaling and one-hot expansion in schema order
//! - `gbdt`: Logistic tree-ensemble model with path attribution
//! - `prediction`: Predictor trait and row-isolated batch scoring
//! - `risk`: Probability to label and risk tier
//! - `attribution`: Collapse of one-hot attributions to semantic fields
//! - `bundle`: Validated model + schema pairing
//! - `serialization`: Canonical JSON and BLAKE3 artifact hashing

pub mod attribution;
pub mod bundle;
pub mod encoder;
pub mod errors;
pub mod gbdt;
pub mod imputation;
pub mod metrics;
pub mod prediction;
pub mod record;
pub mod risk;
pub mod schema;
pub mod serialization;

pub use attribution::{aggregate, attribute, AttributionMap};
pub use bundle::{Assessment, ModelBundle};
pub use encoder::{check_model, encode, encode_batch, numeric_drift_warnings, EncodedRow};
pub use errors::{Result, RiskCoreError};
pub use gbdt::{Contributions, GbdtModel, Node, Tree};
pub use imputation::{
    validate_input, ImputationLogEntry, ImputationOutcome, ImputationStrategy, Imputer,
};
pub use metrics::MetricsSnapshot;
pub use prediction::{predict_batch, Predictor};
pub use record::{FieldValue, LoanRecord};
pub use risk::{PredictionResult, RiskLevel, RiskThresholds};
pub use schema::{
    dummy_column_name, CategoricalStats, FeatureSchema, FieldKind, FieldSpec, NumericStats,
};

/// Crate version string for metadata and model cards
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
