//! Target normalization into {0, 1}

use crate::dataset::TabularDataset;
use crate::errors::{Result, TrainerError};
use std::collections::BTreeMap;
use tracing::warn;

/// Label synonyms; 1 means default / bad outcome
const SYNONYMS: &[(&str, u8)] = &[
    ("default", 1),
    ("no_default", 0),
    ("yes", 1),
    ("no", 0),
    ("y", 1),
    ("n", 0),
    ("1", 1),
    ("0", 0),
    ("true", 1),
    ("false", 0),
    ("approved", 0),
    ("rejected", 1),
    ("good", 0),
    ("bad", 1),
];

/// Per-row labels plus the value mapping that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTarget {
    /// `None` for rows whose target could not be mapped
    pub labels: Vec<Option<u8>>,
    /// Raw target value (as seen in the data) to label
    pub mapping: BTreeMap<String, u8>,
    pub dropped_rows: usize,
}

/// Maps raw target values to binary labels
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetNormalizer;

impl TargetNormalizer {
    fn synonym(value: &str) -> Option<u8> {
        let lowered = value.trim().to_ascii_lowercase();
        SYNONYMS
            .iter()
            .find(|(name, _)| *name == lowered)
            .map(|(_, label)| *label)
    }

    pub fn normalize(&self, dataset: &TabularDataset, target: &str) -> Result<NormalizedTarget> {
        let idx = dataset
            .column_index(target)
            .ok_or_else(|| TrainerError::Dataset(format!("target column '{target}' not found")))?;

        let distinct = dataset.distinct_values(idx);
        let mut mapping: BTreeMap<String, u8> = distinct
            .iter()
            .filter_map(|value| Self::synonym(value).map(|label| (value.clone(), label)))
            .collect();

        // Two unrecognised values: order them rather than discard every row
        if mapping.is_empty() && distinct.len() == 2 {
            warn!(
                target,
                values = ?distinct,
                "target values not recognised; mapping lexicographically"
            );
            mapping = distinct.iter().cloned().zip([0u8, 1u8]).collect();
        }

        let labels: Vec<Option<u8>> = dataset
            .column(idx)
            .map(|cell| cell.as_category().and_then(|v| mapping.get(&v).copied()))
            .collect();
        let dropped_rows = labels.iter().filter(|l| l.is_none()).count();

        if dropped_rows > 0 {
            let unmapped: Vec<&String> = distinct
                .iter()
                .filter(|v| !mapping.contains_key(*v))
                .collect();
            warn!(
                target,
                dropped_rows,
                unmapped = ?unmapped,
                "dropping rows with unmapped target values"
            );
        }

        Ok(NormalizedTarget {
            labels,
            mapping,
            dropped_rows,
        })
    }
}
