//! Request and response types for the prediction service

use crate::explain::ExplanationSource;
use credit_risk_core::{AttributionMap, LoanRecord, RiskLevel};
use serde::Serialize;

/// Full outcome of scoring one application
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub risk_level: RiskLevel,
    /// 0 to 100, one decimal place
    pub probability_default_percent: f64,
    pub binary_prediction: u8,
    pub input_features_original: LoanRecord,
    pub input_features_imputed: LoanRecord,
    /// `"field: strategy"` lines in schema order
    pub imputation_log: Vec<String>,
    pub shap_explanation: AttributionMap,
    pub llm_explanation: Option<String>,
    pub remediation_suggestion: Option<String>,
    pub data_drift_warnings: Vec<String>,
    pub validation_warnings: Vec<String>,
    pub explanation_source: Option<ExplanationSource>,
    pub model_version: String,
}

/// A row that could not be scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub index: usize,
    pub error: String,
}

/// One position in a batch result list
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Prediction(Box<PredictionResponse>),
    Error(ErrorEntry),
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        matches!(self, BatchItem::Prediction(_))
    }
}

/// Batch outcome; `results` keeps input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub errors: Vec<ErrorEntry>,
    pub successful: usize,
    pub failed: usize,
}

impl BatchResponse {
    pub fn from_items(results: Vec<BatchItem>) -> Self {
        let errors: Vec<ErrorEntry> = results
            .iter()
            .filter_map(|item| match item {
                BatchItem::Error(entry) => Some(entry.clone()),
                BatchItem::Prediction(_) => None,
            })
            .collect();
        let failed = errors.len();
        Self {
            successful: results.len() - failed,
            failed,
            results,
            errors,
        }
    }
}
