//! Schema fitting and matrix construction
//!
//! The schema (scaler parameters, category levels and historical
//! statistics) is fitted on the full cleaned dataset. Missing training
//! cells are filled with the fitted median or mode, then every row goes
//! through the same encoder used at serving time.

use crate::dataset::TabularDataset;
use crate::errors::{Result, TrainerError};
use credit_risk_core::{
    encode, CategoricalStats, FeatureSchema, FieldKind, FieldSpec, FieldValue, LoanRecord,
    NumericStats,
};
use std::collections::BTreeMap;

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Fit statistics of one numeric column over the given rows
pub fn fit_numeric(dataset: &TabularDataset, column: usize, rows: &[usize]) -> Option<NumericStats> {
    let mut values: Vec<f64> = rows
        .iter()
        .filter_map(|&r| dataset.rows[r][column].as_f64())
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std = variance.sqrt();

    Some(NumericStats {
        median: Some(median(&values)),
        mean,
        scale: if std > 0.0 { std } else { 1.0 },
        min: values[0],
        max: values[count - 1],
        std,
        count,
    })
}

/// Fit levels and mode of one categorical column over the given rows.
///
/// Levels are sorted; the mode breaks ties toward the smallest level.
pub fn fit_categorical(
    dataset: &TabularDataset,
    column: usize,
    rows: &[usize],
) -> Option<CategoricalStats> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for &r in rows {
        if let Some(label) = dataset.rows[r][column].as_category() {
            *counts.entry(label).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return None;
    }

    let mut mode: Option<(&String, usize)> = None;
    for (level, &n) in &counts {
        if mode.map_or(true, |(_, best)| n > best) {
            mode = Some((level, n));
        }
    }
    let mode = mode.map(|(level, _)| level.clone());

    Some(CategoricalStats {
        count: counts.values().sum(),
        levels: counts.into_keys().collect(),
        mode,
    })
}

/// Fit a schema over the given rows: numeric fields first, then categorical
pub fn fit_schema(
    dataset: &TabularDataset,
    target: &str,
    numeric: &[String],
    categorical: &[String],
    rows: &[usize],
) -> Result<FeatureSchema> {
    let column = |name: &str| {
        dataset
            .column_index(name)
            .ok_or_else(|| TrainerError::Dataset(format!("column '{name}' not found")))
    };

    let mut fields = Vec::with_capacity(numeric.len() + categorical.len());
    for name in numeric {
        if let Some(stats) = fit_numeric(dataset, column(name)?, rows) {
            fields.push(FieldSpec::numeric(name.clone(), stats));
        }
    }
    for name in categorical {
        if let Some(stats) = fit_categorical(dataset, column(name)?, rows) {
            fields.push(FieldSpec::categorical(name.clone(), stats));
        }
    }
    if fields.is_empty() {
        return Err(TrainerError::InsufficientData(
            "no usable feature columns".to_string(),
        ));
    }

    let schema = FeatureSchema::new(Some(target.to_string()), fields);
    schema.validate()?;
    Ok(schema)
}

/// One dataset row restricted to schema fields, gaps filled from the schema
pub fn training_record(dataset: &TabularDataset, schema: &FeatureSchema, row: usize) -> LoanRecord {
    schema
        .fields
        .iter()
        .map(|spec| {
            let value = dataset
                .column_index(&spec.name)
                .map(|c| dataset.rows[row][c].clone())
                .unwrap_or_default();
            let value = match (value, &spec.kind) {
                (FieldValue::Absent, FieldKind::Numeric(stats)) => {
                    FieldValue::Number(stats.median.unwrap_or(stats.mean))
                }
                (FieldValue::Absent, FieldKind::Categorical(stats)) => stats
                    .mode
                    .clone()
                    .map(FieldValue::Text)
                    .unwrap_or_default(),
                (present, _) => present,
            };
            (spec.name.clone(), value)
        })
        .collect()
}

/// Encode the given rows with the serving encoder
pub fn build_matrix(
    dataset: &TabularDataset,
    schema: &FeatureSchema,
    rows: &[usize],
) -> Result<Vec<Vec<f64>>> {
    rows.iter()
        .map(|&r| {
            let record = training_record(dataset, schema, r);
            Ok(encode(&record, schema)?.values)
        })
        .collect()
}
