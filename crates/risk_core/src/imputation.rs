//! Imputation engine
//!
//! Fills every schema field the caller did not supply. Three tiers are
//! tried in order and exactly one fires per missing field:
//!
//! 1. **derived**: a fixed formula over fields the caller did supply
//! 2. **historical**: the schema's training median (numeric) or mode (categorical)
//! 3. **default**: a domain-safe constant
//!
//! Imputation never fails; the default tier always yields a value.

use crate::record::{format_number, FieldValue, LoanRecord};
use crate::schema::{FieldKind, FeatureSchema, FieldSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Fields whose absence is called out to the caller
pub const CRITICAL_FIELDS: &[&str] = &["person_income", "loan_amnt"];

/// Which tier produced an imputed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    Derived,
    Historical,
    Default,
}

impl fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ImputationStrategy::Derived => "derived",
            ImputationStrategy::Historical => "historical",
            ImputationStrategy::Default => "default",
        };
        f.write_str(tag)
    }
}

/// One imputed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationLogEntry {
    pub field: String,
    pub strategy: ImputationStrategy,
    pub value: FieldValue,
}

impl fmt::Display for ImputationLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.strategy)
    }
}

/// Completed record plus the log of what was filled in
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub record: LoanRecord,
    pub log: Vec<ImputationLogEntry>,
}

impl ImputationOutcome {
    /// Log rendered as `"field: strategy"` lines, in schema order
    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().map(ToString::to_string).collect()
    }
}

/// A field computable from other caller-supplied fields
struct Derivation {
    target: &'static str,
    inputs: &'static [&'static str],
    formula: fn(&[f64]) -> Option<f64>,
}

const DERIVATIONS: &[Derivation] = &[Derivation {
    target: "loan_percent_income",
    inputs: &["loan_amnt", "person_income"],
    formula: |v| (v[1] > 0.0).then(|| v[0] / v[1]),
}];

const NUMERIC_DEFAULTS: &[(&str, f64)] = &[
    ("person_age", 35.0),
    ("person_income", 50_000.0),
    ("person_emp_length", 24.0),
    ("loan_amnt", 10_000.0),
    ("loan_int_rate", 10.0),
    ("loan_percent_income", 0.25),
    ("cb_person_cred_hist_length", 5.0),
];

const CATEGORICAL_DEFAULTS: &[(&str, &str)] = &[
    ("person_home_ownership", "RENT"),
    ("home_ownership", "RENT"),
    ("loan_intent", "PERSONAL"),
    ("loan_grade", "C"),
    ("cb_person_default_on_file", "N"),
    ("default_on_file", "N"),
];

/// Domain-safe constant for a field with no usable statistic
pub fn safe_default(spec: &FieldSpec) -> FieldValue {
    match &spec.kind {
        FieldKind::Numeric(_) => NUMERIC_DEFAULTS
            .iter()
            .find(|(name, _)| *name == spec.name)
            .map(|(_, value)| FieldValue::Number(*value))
            .unwrap_or(FieldValue::Number(0.0)),
        FieldKind::Categorical(_) => CATEGORICAL_DEFAULTS
            .iter()
            .find(|(name, _)| *name == spec.name)
            .map(|(_, value)| FieldValue::from(*value))
            .unwrap_or_else(|| FieldValue::from("UNKNOWN")),
    }
}

fn derive(field: &str, record: &LoanRecord) -> Option<f64> {
    let derivation = DERIVATIONS.iter().find(|d| d.target == field)?;
    let inputs = derivation
        .inputs
        .iter()
        .map(|input| record.get(input).as_f64())
        .collect::<Option<Vec<f64>>>()?;
    (derivation.formula)(&inputs).filter(|v| v.is_finite())
}

/// Policy-driven filler for partial records
#[derive(Debug, Clone, Copy)]
pub struct Imputer {
    /// Minimum training support before a historical statistic is trusted
    pub min_historical_support: usize,
}

impl Default for Imputer {
    fn default() -> Self {
        Self {
            min_historical_support: 1,
        }
    }
}

impl Imputer {
    pub fn new(min_historical_support: usize) -> Self {
        Self {
            min_historical_support,
        }
    }

    fn historical(&self, spec: &FieldSpec) -> Option<FieldValue> {
        if spec.historical_support()? < self.min_historical_support {
            return None;
        }
        match &spec.kind {
            FieldKind::Numeric(stats) => stats.median.map(FieldValue::Number),
            FieldKind::Categorical(stats) => stats.mode.clone().map(FieldValue::Text),
        }
    }

    /// Complete `record` against `schema`.
    ///
    /// Supplied fields pass through untouched, including ones the schema
    /// does not know about.
    pub fn impute(&self, record: &LoanRecord, schema: &FeatureSchema) -> ImputationOutcome {
        let mut completed = record.clone();
        let mut log = Vec::new();

        for spec in &schema.fields {
            if record.is_present(&spec.name) {
                continue;
            }

            let (strategy, value) = if let Some(v) = spec
                .is_numeric()
                .then(|| derive(&spec.name, record))
                .flatten()
            {
                (ImputationStrategy::Derived, FieldValue::Number(v))
            } else if let Some(v) = self.historical(spec) {
                (ImputationStrategy::Historical, v)
            } else {
                (ImputationStrategy::Default, safe_default(spec))
            };

            completed.insert(spec.name.clone(), value.clone());
            log.push(ImputationLogEntry {
                field: spec.name.clone(),
                strategy,
                value,
            });
        }

        if !log.is_empty() {
            debug!(
                imputed = log.len(),
                fields = %log.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                "imputed missing fields"
            );
        }

        ImputationOutcome {
            record: completed,
            log,
        }
    }
}

/// Advisory checks on caller input. Warnings never block a prediction.
pub fn validate_input(record: &LoanRecord, schema: &FeatureSchema) -> Vec<String> {
    let mut warnings = Vec::new();

    if record.has_no_values() {
        warnings.push("No input data provided - all values will be imputed".to_string());
        return warnings;
    }

    let missing: Vec<&str> = CRITICAL_FIELDS
        .iter()
        .copied()
        .filter(|field| !record.is_present(field))
        .collect();
    if !missing.is_empty() {
        warnings.push(format!(
            "Critical fields missing (will be imputed): {}",
            missing.join(", ")
        ));
    }

    if let Some(age) = record.get("person_age").as_f64() {
        if !(18.0..=100.0).contains(&age) {
            warnings.push(format!(
                "person_age ({}) outside valid range [18, 100]",
                format_number(age)
            ));
        }
    }

    if let Some(ratio) = record.get("loan_percent_income").as_f64() {
        if ratio > 1.0 {
            warnings.push(format!(
                "loan_percent_income ({}) > 1 (should be 0-1)",
                format_number(ratio)
            ));
        }
    }

    for spec in schema.fields.iter().filter(|spec| spec.is_numeric()) {
        if let Some(value) = record.get(&spec.name).as_f64() {
            if value < 0.0 {
                warnings.push(format!("{} is negative: {}", spec.name, format_number(value)));
            }
        }
    }

    warnings
}
