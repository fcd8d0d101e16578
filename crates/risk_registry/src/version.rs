//! Model version identifiers and descriptors
//!
//! A version id is the UTC publication time at millisecond precision,
//! `vYYYYMMDDTHHMMSSmmmZ`. Ids sort lexicographically in publication
//! order; a clash with the latest id is resolved by bumping one
//! millisecond.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use credit_risk_core::{FeatureSchema, GbdtModel, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ID_FORMAT: &str = "v%Y%m%dT%H%M%S%3fZ";

/// Version descriptor format
pub const VERSION_FORMAT: u32 = 1;

/// Format a timestamp as a version id
pub fn format_version_id(at: DateTime<Utc>) -> String {
    at.format(ID_FORMAT).to_string()
}

/// Parse the timestamp back out of a version id
pub fn parse_version_id(id: &str) -> Option<DateTime<Utc>> {
    let body = id.strip_prefix('v')?.strip_suffix('Z')?;
    if body.len() != 18 || !body.is_ascii() {
        return None;
    }
    let (seconds, millis) = body.split_at(15);
    let naive = NaiveDateTime::parse_from_str(seconds, "%Y%m%dT%H%M%S").ok()?;
    let millis: i64 = millis.parse().ok()?;
    Some(naive.and_utc() + Duration::milliseconds(millis))
}

/// Next id strictly greater than `latest`
pub fn next_version_id(now: DateTime<Utc>, latest: Option<&str>) -> String {
    let candidate = format_version_id(now);
    match latest {
        Some(latest) if candidate.as_str() <= latest => match parse_version_id(latest) {
            Some(at) => format_version_id(at + Duration::milliseconds(1)),
            None => candidate,
        },
        _ => candidate,
    }
}

/// Hashed artifact inside a version directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRef {
    /// File name relative to the version directory
    pub file: String,
    /// BLAKE3 hash of the canonical artifact bytes
    pub blake3: String,
    pub size_bytes: u64,
}

/// Immutable description of one published version (`version.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelVersion {
    pub format_version: u32,
    pub version_id: String,
    /// RFC 3339 publication time
    pub created_at: String,
    pub model: ArtifactRef,
    pub schema: ArtifactRef,
    pub metrics: ArtifactRef,
    /// Threshold the stored metrics were computed with
    pub decision_threshold: f64,
    pub target: Option<String>,
    pub target_mapping: BTreeMap<String, u8>,
    pub feature_count: usize,
    pub num_trees: usize,
    pub dropped_rows: usize,
    pub core_version: String,
}

/// Artifacts of a freshly trained model, ready to publish
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub model: GbdtModel,
    pub schema: FeatureSchema,
    pub metrics: MetricsSnapshot,
    pub target_mapping: BTreeMap<String, u8>,
    pub dropped_rows: usize,
}

/// Listing entry for one version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSummary {
    pub version_id: String,
    pub created_at: String,
    pub is_active: bool,
    pub target: Option<String>,
    pub feature_count: usize,
    pub accuracy: Option<f64>,
    pub auc_roc: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_format_and_parse() {
        let id = format_version_id(at(589));
        assert_eq!(id, "v20260314T092653589Z");
        assert_eq!(parse_version_id(&id), Some(at(589)));
        assert_eq!(parse_version_id("latest"), None);
        assert_eq!(parse_version_id("v2026Z"), None);
    }

    #[test]
    fn test_ids_strictly_increase() {
        let first = next_version_id(at(0), None);
        let same_ms = next_version_id(at(0), Some(&first));
        let clock_went_back = next_version_id(at(-5000), Some(&same_ms));
        assert!(first < same_ms);
        assert!(same_ms < clock_went_back);
        assert_eq!(same_ms, format_version_id(at(1)));
        assert_eq!(clock_went_back, format_version_id(at(2)));
        assert_eq!(next_version_id(at(10), Some(&first)), format_version_id(at(10)));
    }
}
