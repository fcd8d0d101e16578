//! Attribution aggregator
//!
//! Per-column attributions come from the model in margin (log-odds) space.
//! Numeric columns map one-to-one to their field; the indicator columns of
//! a categorical field are summed into a single entry under the field's
//! name. Positive values increase the predicted default risk.

use crate::errors::{Result, RiskCoreError};
use crate::gbdt::Contributions;
use crate::prediction::Predictor;
use crate::schema::FeatureSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Raw attributions for one encoded row
pub fn attribute<P: Predictor + ?Sized>(model: &P, vector: &[f64]) -> Result<Contributions> {
    model.attribute(vector)
}

/// Semantic feature name to signed contribution, sorted by descending magnitude
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributionMap {
    base_value: f64,
    entries: Vec<(String, f64)>,
}

impl AttributionMap {
    pub fn from_entries(base_value: f64, mut entries: Vec<(String, f64)>) -> Self {
        entries.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Self {
            base_value,
            entries,
        }
    }

    /// Model margin before any feature is taken into account
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, value)| *value)
    }

    /// The `k` largest entries by magnitude
    pub fn top(&self, k: usize) -> &[(String, f64)] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all contributions
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value).sum()
    }
}

/// Collapse per-column attributions into per-field ones
pub fn aggregate(raw: &Contributions, schema: &FeatureSchema) -> Result<AttributionMap> {
    if raw.values.len() != schema.feature_count() {
        return Err(RiskCoreError::SchemaMismatch(format!(
            "{} attributions for {} encoded columns",
            raw.values.len(),
            schema.feature_count()
        )));
    }

    let entries = schema
        .column_ranges()
        .into_iter()
        .map(|(spec, range)| (spec.name.clone(), raw.values[range].iter().sum::<f64>()))
        .collect();

    Ok(AttributionMap::from_entries(raw.bias, entries))
}

impl Serialize for AttributionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = AttributionMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of feature name to contribution")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    entries.push((name, value));
                }
                Ok(AttributionMap::from_entries(0.0, entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::loan_schema;
    use proptest::prelude::*;

    #[test]
    fn test_dummies_collapse_to_field() {
        let schema = loan_schema();
        let raw = Contributions {
            bias: -1.0,
            values: vec![0.1, -0.3, 0.05, 0.2, 0.0, 0.15, 0.1, 0.4, -0.1, 0.0, 0.0],
        };
        let map = aggregate(&raw, &schema).unwrap();

        assert_eq!(map.len(), 6);
        assert!((map.get("person_home_ownership").unwrap() - 0.25).abs() < 1e-12);
        assert!((map.get("loan_grade").unwrap() - 0.3).abs() < 1e-12);
        assert!(map.get("loan_grade_A").is_none());
        assert_eq!(map.base_value(), -1.0);
        assert!((map.total() - raw.values.iter().sum::<f64>()).abs() < 1e-12);
    }

    #[test]
    fn test_sorted_by_magnitude_and_top() {
        let map = AttributionMap::from_entries(
            0.0,
            vec![
                ("a".to_string(), 0.1),
                ("b".to_string(), -0.5),
                ("c".to_string(), 0.3),
            ],
        );
        let names: Vec<&str> = map.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(map.top(2).len(), 2);
        assert_eq!(map.top(10).len(), 3);
    }

    #[test]
    fn test_serializes_in_magnitude_order() {
        let map = AttributionMap::from_entries(
            0.0,
            vec![("small".to_string(), 0.1), ("large".to_string(), -0.9)],
        );
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"large":-0.9,"small":0.1}"#);

        let back: AttributionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries(), map.entries());
    }

    #[test]
    fn test_length_mismatch() {
        let schema = loan_schema();
        let raw = Contributions {
            bias: 0.0,
            values: vec![0.0; 3],
        };
        assert!(matches!(
            aggregate(&raw, &schema),
            Err(RiskCoreError::SchemaMismatch(_))
        ));
    }

    proptest! {
        #[test]
        fn categorical_entry_equals_dummy_sum(values in proptest::collection::vec(-2.0f64..2.0, 11)) {
            let schema = loan_schema();
            let raw = Contributions { bias: 0.0, values: values.clone() };
            let map = aggregate(&raw, &schema).unwrap();
            let home: f64 = values[4..7].iter().sum();
            let grade: f64 = values[7..11].iter().sum();
            prop_assert!((map.get("person_home_ownership").unwrap() - home).abs() < 1e-9);
            prop_assert!((map.get("loan_grade").unwrap() - grade).abs() < 1e-9);
            prop_assert_eq!(map.get("loan_amnt").unwrap(), values[1]);
        }
    }
}
