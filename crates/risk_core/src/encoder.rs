//! Feature encoder
//!
//! Turns a completed record into the numeric vector a model expects.
//! Numeric fields are standard-scored with the schema's scaler; categorical
//! fields expand into one indicator per training-time level. Column order
//! is exactly `schema.feature_names`.

use crate::errors::{Result, RiskCoreError};
use crate::record::LoanRecord;
use crate::schema::{FeatureSchema, FieldKind};
use tracing::warn;

/// An encoded row plus any drift noticed while encoding it
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub values: Vec<f64>,
    pub drift_warnings: Vec<String>,
}

/// Fail with `SchemaMismatch` when a model's width disagrees with the schema.
pub fn check_model(schema: &FeatureSchema, model_feature_count: usize) -> Result<()> {
    if schema.feature_count() != model_feature_count {
        return Err(RiskCoreError::SchemaMismatch(format!(
            "schema encodes {} features but the model expects {}",
            schema.feature_count(),
            model_feature_count
        )));
    }
    Ok(())
}

/// Encode one completed record.
///
/// Unseen categories give an all-zero expansion and a drift warning.
/// A schema field that is still absent, or a numeric field holding text
/// that is not a number, is a `Validation` error.
pub fn encode(record: &LoanRecord, schema: &FeatureSchema) -> Result<EncodedRow> {
    let mut values = Vec::with_capacity(schema.feature_count());
    let mut drift_warnings = Vec::new();

    for spec in &schema.fields {
        let raw = record.get(&spec.name);
        match &spec.kind {
            FieldKind::Numeric(stats) => {
                let value = raw
                    .coerce_number(&spec.name)?
                    .ok_or_else(|| RiskCoreError::validation(&spec.name, "missing value"))?;
                values.push(stats.standardize(value));
            }
            FieldKind::Categorical(stats) => {
                let label = raw
                    .as_category()
                    .ok_or_else(|| RiskCoreError::validation(&spec.name, "missing value"))?;
                let hit = stats.level_index(&label);
                values.extend((0..stats.levels.len()).map(|i| {
                    if Some(i) == hit {
                        1.0
                    } else {
                        0.0
                    }
                }));
                if hit.is_none() {
                    warn!(field = %spec.name, value = %label, "unseen category");
                    drift_warnings.push(format!("{}: unseen category '{}'", spec.name, label));
                }
            }
        }
    }

    // Guards against a schema whose names were edited without its fields
    check_model(schema, values.len())?;

    Ok(EncodedRow {
        values,
        drift_warnings,
    })
}

/// Encode many records; one result per row, in order.
pub fn encode_batch(records: &[LoanRecord], schema: &FeatureSchema) -> Vec<Result<EncodedRow>> {
    records.iter().map(|record| encode(record, schema)).collect()
}

/// Numeric values that fall outside the training distribution
pub fn numeric_drift_warnings(record: &LoanRecord, schema: &FeatureSchema) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter_map(|spec| match &spec.kind {
            FieldKind::Numeric(stats) => record
                .get(&spec.name)
                .as_f64()
                .and_then(|value| stats.drift_warning(&spec.name, value)),
            FieldKind::Categorical(_) => None,
        })
        .collect()
}
