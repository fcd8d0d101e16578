//! Feature schema registry
//!
//! One `FeatureSchema` exists per model version. It records, in order, every
//! raw field the model was trained on, how each one is encoded, the
//! category levels seen at training time and the historical statistics the
//! imputation engine falls back on. The post-encoding column order is
//! derived from the fields and must match the model exactly.

use crate::errors::{Result, RiskCoreError};
use crate::serialization::canonical_json_string;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::Path;

/// Current schema format version
pub const SCHEMA_VERSION: u32 = 1;

/// Training-time statistics and scaler parameters of a numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    /// Historical median used for imputation (absent on hand-built schemas)
    pub median: Option<f64>,
    /// Scaler centre
    pub mean: f64,
    /// Scaler divisor (population standard deviation, 1.0 when constant)
    pub scale: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    /// Number of non-missing training values behind these statistics
    pub count: usize,
}

impl NumericStats {
    /// Standard-score a raw value
    pub fn standardize(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    /// Range check against the training distribution.
    pub fn drift_warning(&self, field: &str, value: f64) -> Option<String> {
        if value < self.min || value > self.max {
            return Some(format!(
                "{field}: value {value} outside training range [{}, {}]",
                self.min, self.max
            ));
        }
        if self.std > 0.0 {
            let lower = self.mean - 3.0 * self.std;
            let upper = self.mean + 3.0 * self.std;
            if value < lower || value > upper {
                return Some(format!(
                    "{field}: value {value} outside 3-sigma range [{lower:.2}, {upper:.2}]"
                ));
            }
        }
        None
    }
}

/// Training-time levels and mode of a categorical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    /// Levels in encoding order
    pub levels: Vec<String>,
    /// Historical mode used for imputation
    pub mode: Option<String>,
    pub count: usize,
}

impl CategoricalStats {
    /// Position of `value` among the levels; exact match first, then
    /// ASCII case-insensitive.
    pub fn level_index(&self, value: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level == value)
            .or_else(|| {
                self.levels
                    .iter()
                    .position(|level| level.eq_ignore_ascii_case(value))
            })
    }
}

/// How a raw field is encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

/// A raw field known to the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: impl Into<String>, stats: NumericStats) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric(stats),
        }
    }

    pub fn categorical(name: impl Into<String>, stats: CategoricalStats) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical(stats),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Numeric(_))
    }

    /// Number of encoded columns this field expands to
    pub fn width(&self) -> usize {
        match &self.kind {
            FieldKind::Numeric(_) => 1,
            FieldKind::Categorical(stats) => stats.levels.len(),
        }
    }

    /// Support count of the stored historical statistic, if any
    pub fn historical_support(&self) -> Option<usize> {
        match &self.kind {
            FieldKind::Numeric(stats) => stats.median.map(|_| stats.count),
            FieldKind::Categorical(stats) => stats.mode.as_ref().map(|_| stats.count),
        }
    }
}

/// Name of the indicator column for one level of a categorical field
pub fn dummy_column_name(field: &str, level: &str) -> String {
    format!("{field}_{level}")
}

/// Ordered feature vector definition for one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub schema_version: u32,
    /// Target column the schema was fitted against
    pub target: Option<String>,
    pub fields: Vec<FieldSpec>,
    /// Post-encoding column names, in model order
    pub feature_names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(target: Option<String>, fields: Vec<FieldSpec>) -> Self {
        let feature_names = derive_feature_names(&fields);
        Self {
            schema_version: SCHEMA_VERSION,
            target,
            fields,
            feature_names,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|spec| spec.name.as_str())
    }

    /// Encoded column range owned by each field, in schema order
    pub fn column_ranges(&self) -> Vec<(&FieldSpec, Range<usize>)> {
        let mut start = 0;
        self.fields
            .iter()
            .map(|spec| {
                let end = start + spec.width();
                let range = start..end;
                start = end;
                (spec, range)
            })
            .collect()
    }

    /// Semantic field that owns an encoded column
    pub fn group_of(&self, column: usize) -> Option<&str> {
        self.column_ranges()
            .into_iter()
            .find(|(_, range)| range.contains(&column))
            .map(|(spec, _)| spec.name.as_str())
    }

    /// Validate internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(RiskCoreError::SchemaMismatch(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(RiskCoreError::SchemaMismatch(format!(
                    "duplicate field '{}'",
                    spec.name
                )));
            }
            match &spec.kind {
                FieldKind::Numeric(stats) => {
                    if !(stats.scale.is_finite() && stats.scale > 0.0) || !stats.mean.is_finite() {
                        return Err(RiskCoreError::SchemaMismatch(format!(
                            "invalid scaler parameters for '{}'",
                            spec.name
                        )));
                    }
                }
                FieldKind::Categorical(stats) => {
                    let unique: HashSet<&str> = stats.levels.iter().map(String::as_str).collect();
                    if stats.levels.is_empty() || unique.len() != stats.levels.len() {
                        return Err(RiskCoreError::SchemaMismatch(format!(
                            "categorical field '{}' needs unique, non-empty levels",
                            spec.name
                        )));
                    }
                }
            }
        }

        let expected = derive_feature_names(&self.fields);
        if expected != self.feature_names {
            return Err(RiskCoreError::SchemaMismatch(format!(
                "feature names do not follow field order ({} declared, {} derived)",
                self.feature_names.len(),
                expected.len()
            )));
        }

        let unique_columns: HashSet<&str> = self.feature_names.iter().map(String::as_str).collect();
        if unique_columns.len() != self.feature_names.len() {
            return Err(RiskCoreError::SchemaMismatch(
                "encoded column names collide".to_string(),
            ));
        }

        Ok(())
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(canonical_json_string(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load and validate a schema
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let schema: FeatureSchema = serde_json::from_str(&json)?;
        schema.validate()?;
        Ok(schema)
    }
}

fn derive_feature_names(fields: &[FieldSpec]) -> Vec<String> {
    let mut names = Vec::new();
    for spec in fields {
        match &spec.kind {
            FieldKind::Numeric(_) => names.push(spec.name.clone()),
            FieldKind::Categorical(stats) => names.extend(
                stats
                    .levels
                    .iter()
                    .map(|level| dummy_column_name(&spec.name, level)),
            ),
        }
    }
    names
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn numeric(median: f64, mean: f64, scale: f64, min: f64, max: f64) -> NumericStats {
        NumericStats {
            median: Some(median),
            mean,
            scale,
            min,
            max,
            std: scale,
            count: 100,
        }
    }

    pub fn categorical(levels: &[&str], mode: &str) -> CategoricalStats {
        CategoricalStats {
            levels: levels.iter().map(|l| l.to_string()).collect(),
            mode: Some(mode.to_string()),
            count: 100,
        }
    }

    /// Small loan schema used across the crate's unit tests
    pub fn loan_schema() -> FeatureSchema {
        FeatureSchema::new(
            Some("loan_status".to_string()),
            vec![
                FieldSpec::numeric("person_income", numeric(55000.0, 60000.0, 20000.0, 4000.0, 600000.0)),
                FieldSpec::numeric("loan_amnt", numeric(8000.0, 9500.0, 6000.0, 500.0, 35000.0)),
                FieldSpec::numeric("loan_percent_income", numeric(0.15, 0.17, 0.1, 0.0, 0.83)),
                FieldSpec::numeric("loan_int_rate", numeric(11.0, 11.0, 3.0, 5.0, 23.0)),
                FieldSpec::categorical("person_home_ownership", categorical(&["MORTGAGE", "OWN", "RENT"], "RENT")),
                FieldSpec::categorical("loan_grade", categorical(&["A", "B", "C", "D"], "A")),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_feature_names_follow_field_order() {
        let schema = loan_schema();
        assert_eq!(schema.feature_count(), 4 + 3 + 4);
        assert_eq!(schema.feature_names[0], "person_income");
        assert_eq!(schema.feature_names[4], "person_home_ownership_MORTGAGE");
        assert_eq!(schema.feature_names[10], "loan_grade_D");
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_column_ranges() {
        let schema = loan_schema();
        let ranges = schema.column_ranges();
        assert_eq!(ranges[4].0.name, "person_home_ownership");
        assert_eq!(ranges[4].1, 4..7);
        assert_eq!(ranges[5].1, 7..11);
        assert_eq!(schema.group_of(5), Some("person_home_ownership"));
        assert_eq!(schema.group_of(2), Some("loan_percent_income"));
        assert_eq!(schema.group_of(11), None);
    }

    #[test]
    fn test_validation_rejects_tampered_names() {
        let mut schema = loan_schema();
        schema.feature_names.swap(0, 1);
        assert!(matches!(
            schema.validate(),
            Err(RiskCoreError::SchemaMismatch(_))
        ));

        let mut schema = loan_schema();
        if let FieldKind::Numeric(stats) = &mut schema.fields[0].kind {
            stats.scale = 0.0;
        }
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_level_lookup_is_case_tolerant() {
        let stats = categorical(&["RENT", "OWN"], "RENT");
        assert_eq!(stats.level_index("OWN"), Some(1));
        assert_eq!(stats.level_index("own"), Some(1));
        assert_eq!(stats.level_index("LEASE"), None);
    }

    #[test]
    fn test_numeric_drift_warning() {
        let stats = numeric(10.0, 10.0, 2.0, 0.0, 100.0);
        assert!(stats.drift_warning("x", 12.0).is_none());
        assert!(stats.drift_warning("x", 150.0).unwrap().contains("training range"));
        assert!(stats.drift_warning("x", 30.0).unwrap().contains("3-sigma"));
    }

    #[test]
    fn test_save_load_json() {
        let schema = loan_schema();
        let file = tempfile::NamedTempFile::new().unwrap();
        schema.save_json(file.path()).unwrap();
        let loaded = FeatureSchema::load_json(file.path()).unwrap();
        assert_eq!(schema, loaded);
    }
}
