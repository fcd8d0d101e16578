//! Tabular training data
//!
//! Rows arrive as field-to-value maps from an ingestion component, or from
//! a CSV file for the command-line trainer. Cells stay tagged until column
//! detection decides how each column is read.

use crate::errors::{Result, TrainerError};
use credit_risk_core::{FieldValue, LoanRecord};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

/// Untyped table with named columns
#[derive(Clone, Debug, Default)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl TabularDataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FieldValue>>) -> Result<Self> {
        if let Some(pos) = rows.iter().position(|row| row.len() != columns.len()) {
            return Err(TrainerError::Dataset(format!(
                "row {} has {} cells for {} columns",
                pos,
                rows[pos].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build from row maps; columns appear in first-seen order and
    /// cells a row does not mention are absent.
    pub fn from_records(records: &[LoanRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in records {
            for (name, _) in record.iter() {
                if !index.contains_key(name) {
                    index.insert(name.clone(), columns.len());
                    columns.push(name.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|name| record.get(name).clone())
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Load a CSV file with a header row
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        Self::from_csv(reader)
    }

    /// Load CSV data with a header row from any reader
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(TrainerError::Dataset("CSV has no header".to_string()));
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != columns.len() {
                return Err(TrainerError::Dataset(format!(
                    "line {}: expected {} fields, got {}",
                    line + 2,
                    columns.len(),
                    record.len()
                )));
            }
            rows.push(record.iter().map(FieldValue::from_raw_str).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Get number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &FieldValue> {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Distinct non-absent values of a column, rendered as category labels
    pub fn distinct_values(&self, idx: usize) -> BTreeSet<String> {
        self.column(idx).filter_map(FieldValue::as_category).collect()
    }

    /// One row as a record
    pub fn record(&self, row: usize) -> LoanRecord {
        self.columns
            .iter()
            .cloned()
            .zip(self.rows[row].iter().cloned())
            .collect()
    }
}
