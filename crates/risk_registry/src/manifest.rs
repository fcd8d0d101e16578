//! Registry manifest
//!
//! `manifest.json` is the only mutable file in the model directory. It
//! records every published version in publication order, the current
//! pointer, and an append-only log of activations. Writes go to a
//! temporary file which is then renamed over the old manifest.

use crate::errors::{RegistryError, Result};
use credit_risk_core::serialization::canonical_json_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Manifest schema version
pub const MANIFEST_VERSION: u32 = 1;

/// Why the current pointer moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    Activate,
    Rollback,
}

/// One entry of the activation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub version_id: String,
    pub previous: Option<String>,
    pub kind: ActivationKind,
    /// RFC 3339 time of the change
    pub at: String,
}

/// Canonical manifest of a model directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest_version: u32,
    pub current: Option<String>,
    /// Published version ids, oldest first
    pub history: Vec<String>,
    pub activations: Vec<ActivationRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            current: None,
            history: Vec::new(),
            activations: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn contains(&self, version_id: &str) -> bool {
        self.history.iter().any(|v| v == version_id)
    }

    pub fn latest(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    /// Record a newly published version
    pub fn record_published(&mut self, version_id: &str) -> Result<()> {
        if self.contains(version_id) {
            return Err(RegistryError::Manifest(format!(
                "version {version_id} already published"
            )));
        }
        if let Some(latest) = self.latest() {
            if version_id <= latest {
                return Err(RegistryError::Manifest(format!(
                    "version {version_id} does not sort after {latest}"
                )));
            }
        }
        self.history.push(version_id.to_string());
        Ok(())
    }

    /// Point `current` at a published version
    pub fn activate(&mut self, version_id: &str, at: String) -> Result<()> {
        if !self.contains(version_id) {
            return Err(RegistryError::VersionNotFound(version_id.to_string()));
        }
        self.move_pointer(version_id, ActivationKind::Activate, at);
        Ok(())
    }

    /// Re-point to the version that was active before the current one.
    ///
    /// Returns the new current version. A second rollback returns to the
    /// version that was rolled back from.
    pub fn rollback(&mut self, at: String) -> Result<String> {
        let current = self.current.clone().ok_or(RegistryError::NoActiveVersion)?;
        let previous = self
            .activations
            .iter()
            .rev()
            .find(|record| record.version_id == current)
            .and_then(|record| record.previous.clone())
            .ok_or_else(|| {
                RegistryError::Manifest(format!("no earlier activation before {current}"))
            })?;
        self.move_pointer(&previous, ActivationKind::Rollback, at);
        Ok(previous)
    }

    fn move_pointer(&mut self, version_id: &str, kind: ActivationKind, at: String) {
        self.activations.push(ActivationRecord {
            version_id: version_id.to_string(),
            previous: self.current.clone(),
            kind,
            at,
        });
        self.current = Some(version_id.to_string());
    }

    /// Load the manifest, or an empty one if the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&data)
            .map_err(|err| RegistryError::Manifest(format!("{}: {err}", path.display())))?;
        if manifest.manifest_version != MANIFEST_VERSION {
            return Err(RegistryError::Manifest(format!(
                "unsupported manifest version {}",
                manifest.manifest_version
            )));
        }
        Ok(manifest)
    }

    /// Serialize to canonical JSON and atomically replace the file on disk
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = canonical_json_string(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
