//! Evaluation metrics snapshot stored alongside every model version

use serde::{Deserialize, Serialize};

/// Hold-out evaluation of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc_roc: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Share of positive (default) labels in the cleaned dataset
    pub positive_rate: f64,
    /// Threshold the label metrics were computed with
    pub decision_threshold: f64,
}
