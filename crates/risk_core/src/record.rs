//! Tagged loan records
//!
//! Callers hand over whatever they have: a field may be a number, a string,
//! or missing altogether. Values stay tagged until the schema says how a
//! field should be read.

use crate::errors::{Result, RiskCoreError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Text values that mean "no value" when ingesting untyped data
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

/// A single raw field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl FieldValue {
    /// Build a value from an untyped cell, e.g. a CSV field.
    pub fn from_raw_str(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_missing_marker(trimmed) {
            return FieldValue::Absent;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => FieldValue::Number(n),
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Absent,
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or_default(),
            Value::String(s) => {
                if is_missing_marker(s.trim()) {
                    FieldValue::Absent
                } else {
                    FieldValue::Text(s)
                }
            }
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Read the value as a number.
    ///
    /// Numeric text is accepted; any other text is a validation error.
    pub fn coerce_number(&self, field: &str) -> Result<Option<f64>> {
        match self {
            FieldValue::Absent => Ok(None),
            FieldValue::Number(n) if n.is_finite() => Ok(Some(*n)),
            FieldValue::Number(n) => Err(RiskCoreError::validation(
                field,
                format!("non-finite number {n}"),
            )),
            FieldValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(RiskCoreError::validation(
                    field,
                    format!("expected a number, got '{s}'"),
                )),
            },
        }
    }

    /// Lenient numeric view used by advisory checks and explanation rules
    pub fn as_f64(&self) -> Option<f64> {
        self.coerce_number("").ok().flatten()
    }

    /// Read the value as a category label.
    pub fn as_category(&self) -> Option<String> {
        match self {
            FieldValue::Absent => None,
            FieldValue::Number(n) => Some(format_number(*n)),
            FieldValue::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", format_number(*n)),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Absent => write!(f, "null"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(value))
    }
}

/// Render whole numbers without a fractional part so `1.0` and `"1"` agree
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn is_missing_marker(trimmed: &str) -> bool {
    MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}

/// Mapping from raw field name to an optional tagged value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl LoanRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy in tests and fixtures
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Value for a field; missing keys read as `Absent`.
    pub fn get(&self, field: &str) -> &FieldValue {
        static ABSENT: FieldValue = FieldValue::Absent;
        self.fields.get(field).unwrap_or(&ABSENT)
    }

    /// A field is present when it has a non-absent value
    pub fn is_present(&self, field: &str) -> bool {
        !self.get(field).is_absent()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when no field carries a value
    pub fn has_no_values(&self) -> bool {
        self.fields.values().all(FieldValue::is_absent)
    }
}

impl FromIterator<(String, FieldValue)> for LoanRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
