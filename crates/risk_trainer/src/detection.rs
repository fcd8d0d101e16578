//! Target and column-type detection
//!
//! Target detection is an ordered list of independent rules. The first
//! rule that names a column wins.

use crate::dataset::TabularDataset;
use crate::errors::{Result, TrainerError};
use credit_risk_core::FieldValue;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Target names recognised without a hint, in priority order
pub const TARGET_CANDIDATES: &[&str] = &["loan_status", "default", "target", "label", "outcome"];

/// Numeric columns with fewer distinct values than this may be categorical
const CATEGORICAL_MAX_DISTINCT: usize = 10;
/// ... provided distinct/rows is also below this ratio
const CATEGORICAL_MAX_RATIO: f64 = 0.05;

/// One way of finding the target column
pub trait TargetRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, dataset: &TabularDataset) -> Option<String>;
}

/// Caller-supplied column name
pub struct HintRule(pub Option<String>);

impl TargetRule for HintRule {
    fn name(&self) -> &'static str {
        "hint"
    }

    fn detect(&self, dataset: &TabularDataset) -> Option<String> {
        let hint = self.0.as_deref()?;
        if dataset.column_index(hint).is_some() {
            Some(hint.to_string())
        } else {
            warn!(hint, "target hint names a missing column; ignoring it");
            None
        }
    }
}

/// First well-known target name present in the dataset
pub struct CandidateNameRule {
    pub candidates: Vec<String>,
}

impl Default for CandidateNameRule {
    fn default() -> Self {
        Self {
            candidates: TARGET_CANDIDATES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TargetRule for CandidateNameRule {
    fn name(&self) -> &'static str {
        "candidate_name"
    }

    fn detect(&self, dataset: &TabularDataset) -> Option<String> {
        self.candidates
            .iter()
            .find(|candidate| dataset.column_index(candidate).is_some())
            .cloned()
    }
}

/// First column with exactly two distinct values
pub struct BinaryCardinalityRule;

impl TargetRule for BinaryCardinalityRule {
    fn name(&self) -> &'static str {
        "binary_cardinality"
    }

    fn detect(&self, dataset: &TabularDataset) -> Option<String> {
        (0..dataset.columns.len())
            .find(|&idx| dataset.distinct_values(idx).len() == 2)
            .map(|idx| dataset.columns[idx].clone())
    }
}

/// Ordered rule chain for target detection
pub struct TargetDetector {
    rules: Vec<Box<dyn TargetRule>>,
}

impl TargetDetector {
    pub fn new(rules: Vec<Box<dyn TargetRule>>) -> Self {
        Self { rules }
    }

    /// Hint, then well-known names, then the binary-cardinality heuristic
    pub fn standard(hint: Option<String>) -> Self {
        Self::new(vec![
            Box::new(HintRule(hint)),
            Box::new(CandidateNameRule::default()),
            Box::new(BinaryCardinalityRule),
        ])
    }

    pub fn detect(&self, dataset: &TabularDataset) -> Result<String> {
        for rule in &self.rules {
            if let Some(column) = rule.detect(dataset) {
                info!(rule = rule.name(), target = %column, "detected target column");
                return Ok(column);
            }
        }
        Err(TrainerError::TargetNotFound {
            candidates: TARGET_CANDIDATES.iter().map(|c| c.to_string()).collect(),
        })
    }
}

/// How a feature column is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Classify one column; `None` when it has no values at all.
pub fn classify_column(dataset: &TabularDataset, idx: usize) -> Option<ColumnKind> {
    let mut present = 0usize;
    let mut all_numeric = true;
    for cell in dataset.column(idx) {
        match cell {
            FieldValue::Absent => {}
            other => {
                present += 1;
                if other.as_f64().is_none() {
                    all_numeric = false;
                }
            }
        }
    }
    if present == 0 {
        return None;
    }
    if !all_numeric {
        return Some(ColumnKind::Categorical);
    }

    let distinct = dataset.distinct_values(idx).len();
    let ratio = distinct as f64 / dataset.len() as f64;
    if distinct < CATEGORICAL_MAX_DISTINCT && ratio < CATEGORICAL_MAX_RATIO {
        Some(ColumnKind::Categorical)
    } else {
        Some(ColumnKind::Numeric)
    }
}

/// Feature columns split by kind, each list in dataset order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPartition {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    /// Columns with no values at all
    pub skipped: Vec<String>,
}

pub fn partition_columns(dataset: &TabularDataset, target: &str) -> ColumnPartition {
    let mut partition = ColumnPartition::default();
    for (idx, name) in dataset.columns.iter().enumerate() {
        if name == target {
            continue;
        }
        match classify_column(dataset, idx) {
            Some(ColumnKind::Numeric) => partition.numeric.push(name.clone()),
            Some(ColumnKind::Categorical) => partition.categorical.push(name.clone()),
            None => partition.skipped.push(name.clone()),
        }
    }
    info!(
        numeric = partition.numeric.len(),
        categorical = partition.categorical.len(),
        skipped = partition.skipped.len(),
        "partitioned feature columns"
    );
    partition
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> TabularDataset {
        TabularDataset::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_candidate_name_wins_over_binary_column() {
        let ds = dataset("flag,outcome\nY,good\nN,bad\nY,fair\n");
        assert_eq!(TargetDetector::standard(None).detect(&ds).unwrap(), "outcome");
    }

    #[test]
    fn test_hint_first_and_missing_hint_ignored() {
        let ds = dataset("flag,outcome\nY,good\nN,bad\n");
        let detector = TargetDetector::standard(Some("flag".to_string()));
        assert_eq!(detector.detect(&ds).unwrap(), "flag");

        let detector = TargetDetector::standard(Some("nope".to_string()));
        assert_eq!(detector.detect(&ds).unwrap(), "outcome");
    }

    #[test]
    fn test_binary_fallback_and_not_found() {
        let ds = dataset("a,b\n1,x\n2,y\n3,x\n");
        assert_eq!(TargetDetector::standard(None).detect(&ds).unwrap(), "b");

        let ds = dataset("a,b\n1,x\n2,y\n3,z\n");
        let err = TargetDetector::standard(None).detect(&ds).unwrap_err();
        assert!(matches!(err, TrainerError::TargetNotFound { .. }));
        assert!(err.to_string().contains("loan_status"));
    }

    #[test]
    fn test_partition() {
        let mut csv = String::from("income,grade,term,empty,loan_status\n");
        for i in 0..100 {
            let term = if i % 2 == 0 { 36 } else { 60 };
            csv.push_str(&format!("{},{},{},,{}\n", 1000 + i, ["A", "B"][i % 2], term, i % 2));
        }
        let ds = dataset(&csv);
        let partition = partition_columns(&ds, "loan_status");
        assert_eq!(partition.numeric, vec!["income"]);
        assert_eq!(partition.categorical, vec!["grade", "term"]);
        assert_eq!(partition.skipped, vec!["empty"]);
    }
}
