//! On-disk version store
//!
//! ```text
//! <model_dir>/manifest.json
//! <model_dir>/versions/<id>/{model.json, schema.json, metrics.json, version.json, model_card.md}
//! ```
//!
//! A version directory is assembled under a hidden staging name and
//! renamed into place only when complete, then the manifest is updated.
//! Version directories are never modified afterwards.

use crate::card::render_model_card;
use crate::errors::{RegistryError, Result};
use crate::manifest::Manifest;
use crate::version::{next_version_id, ArtifactRef, ModelVersion, NewVersion, VersionSummary, VERSION_FORMAT};
use chrono::{DateTime, SecondsFormat, Utc};
use credit_risk_core::serialization::{blake3_hex, canonical_json_string};
use credit_risk_core::{FeatureSchema, GbdtModel, MetricsSnapshot, ModelBundle};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const MANIFEST_FILE: &str = "manifest.json";
const VERSIONS_DIR: &str = "versions";
const MODEL_FILE: &str = "model.json";
const SCHEMA_FILE: &str = "schema.json";
const METRICS_FILE: &str = "metrics.json";
const VERSION_FILE: &str = "version.json";
const CARD_FILE: &str = "model_card.md";

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write one artifact as canonical JSON and describe it
fn write_artifact<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<ArtifactRef> {
    let json = canonical_json_string(value)?;
    fs::write(dir.join(file), &json)?;
    Ok(ArtifactRef {
        file: file.to_string(),
        blake3: blake3_hex(json.as_bytes()),
        size_bytes: json.len() as u64,
    })
}

/// Read an artifact, verify its hash, and deserialize it
fn read_artifact<T: DeserializeOwned>(dir: &Path, version: &str, artifact: &ArtifactRef) -> Result<T> {
    let bytes = fs::read(dir.join(&artifact.file))
        .map_err(|err| RegistryError::artifact(version, format!("{}: {err}", artifact.file)))?;
    let actual = blake3_hex(&bytes);
    if actual != artifact.blake3 {
        return Err(RegistryError::artifact(
            version,
            format!(
                "{} hash mismatch (expected {}, found {actual})",
                artifact.file, artifact.blake3
            ),
        ));
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| RegistryError::artifact(version, format!("{}: {err}", artifact.file)))
}

/// Versioned model directory
pub struct VersionStore {
    root: PathBuf,
    /// Serialises manifest read-modify-write cycles within the process
    write_lock: Mutex<()>,
}

impl VersionStore {
    /// Open (and create if needed) a model directory
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(VERSIONS_DIR))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn version_dir(&self, version_id: &str) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(version_id)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load_or_default(self.manifest_path())
    }

    /// Currently activated version id, if any
    pub fn current(&self) -> Result<Option<String>> {
        Ok(self.manifest()?.current)
    }

    /// Publish a new immutable version. It is not activated.
    #[instrument(skip_all)]
    pub fn publish(&self, new: &NewVersion) -> Result<ModelVersion> {
        self.publish_at(new, Utc::now())
    }

    /// Publish with an explicit clock reading
    pub fn publish_at(&self, new: &NewVersion, now: DateTime<Utc>) -> Result<ModelVersion> {
        // reject broken pairs before anything touches disk
        ModelBundle::new(
            "unpublished",
            new.model.clone(),
            new.schema.clone(),
            Some(new.metrics.clone()),
        )?;

        let _guard = self.write_lock.lock();
        let mut manifest = self.manifest()?;

        let mut version_id = next_version_id(now, manifest.latest());
        while self.version_dir(&version_id).exists() {
            version_id = next_version_id(now, Some(&version_id));
        }

        let staging = self.root.join(VERSIONS_DIR).join(format!(".staging-{version_id}"));
        let version = match self.stage(&staging, &version_id, now, new) {
            Ok(version) => version,
            Err(err) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(err);
            }
        };

        let final_dir = self.version_dir(&version_id);
        if let Err(err) = fs::rename(&staging, &final_dir) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err.into());
        }

        let recorded = manifest
            .record_published(&version_id)
            .and_then(|()| manifest.write_to_path(self.manifest_path()));
        if let Err(err) = recorded {
            warn!(version = %version_id, error = %err, "manifest update failed, removing version");
            let _ = fs::remove_dir_all(&final_dir);
            return Err(err);
        }

        info!(
            version = %version_id,
            trees = version.num_trees,
            features = version.feature_count,
            "published model version"
        );
        Ok(version)
    }

    fn stage(
        &self,
        staging: &Path,
        version_id: &str,
        now: DateTime<Utc>,
        new: &NewVersion,
    ) -> Result<ModelVersion> {
        fs::create_dir_all(staging)?;
        let model = write_artifact(staging, MODEL_FILE, &new.model)?;
        let schema = write_artifact(staging, SCHEMA_FILE, &new.schema)?;
        let metrics = write_artifact(staging, METRICS_FILE, &new.metrics)?;

        let version = ModelVersion {
            format_version: VERSION_FORMAT,
            version_id: version_id.to_string(),
            created_at: rfc3339(now),
            model,
            schema,
            metrics,
            decision_threshold: new.metrics.decision_threshold,
            target: new.schema.target.clone(),
            target_mapping: new.target_mapping.clone(),
            feature_count: new.model.feature_count,
            num_trees: new.model.num_trees(),
            dropped_rows: new.dropped_rows,
            core_version: credit_risk_core::VERSION.to_string(),
        };
        fs::write(staging.join(VERSION_FILE), canonical_json_string(&version)?)?;
        fs::write(
            staging.join(CARD_FILE),
            render_model_card(&version, &new.schema, &new.metrics),
        )?;
        debug!(staging = %staging.display(), "staged version artifacts");
        Ok(version)
    }

    /// Read a version descriptor
    pub fn describe(&self, version_id: &str) -> Result<ModelVersion> {
        if !self.manifest()?.contains(version_id) {
            return Err(RegistryError::VersionNotFound(version_id.to_string()));
        }
        let path = self.version_dir(version_id).join(VERSION_FILE);
        let data = fs::read(&path)
            .map_err(|err| RegistryError::artifact(version_id, format!("{VERSION_FILE}: {err}")))?;
        let version: ModelVersion = serde_json::from_slice(&data)
            .map_err(|err| RegistryError::artifact(version_id, format!("{VERSION_FILE}: {err}")))?;
        if version.version_id != version_id {
            return Err(RegistryError::artifact(
                version_id,
                format!("descriptor names version {}", version.version_id),
            ));
        }
        Ok(version)
    }

    /// Load and verify every artifact of a version and pair them
    #[instrument(skip(self))]
    pub fn load_bundle(&self, version_id: &str) -> Result<ModelBundle> {
        let version = self.describe(version_id)?;
        let dir = self.version_dir(version_id);
        let model: GbdtModel = read_artifact(&dir, version_id, &version.model)?;
        let schema: FeatureSchema = read_artifact(&dir, version_id, &version.schema)?;
        let metrics: MetricsSnapshot = read_artifact(&dir, version_id, &version.metrics)?;

        ModelBundle::new(version_id, model, schema, Some(metrics))
            .map_err(|err| RegistryError::artifact(version_id, err.to_string()))
    }

    /// All published versions, oldest first
    pub fn list(&self) -> Result<Vec<VersionSummary>> {
        let manifest = self.manifest()?;
        manifest
            .history
            .iter()
            .map(|id| {
                let version = self.describe(id)?;
                let dir = self.version_dir(id);
                let metrics = read_artifact::<MetricsSnapshot>(&dir, id, &version.metrics).ok();
                Ok(VersionSummary {
                    is_active: manifest.current.as_deref() == Some(id.as_str()),
                    version_id: version.version_id,
                    created_at: version.created_at,
                    target: version.target,
                    feature_count: version.feature_count,
                    accuracy: metrics.as_ref().map(|m| m.accuracy),
                    auc_roc: metrics.as_ref().map(|m| m.auc_roc),
                })
            })
            .collect()
    }

    /// Make a version current after checking that it loads
    #[instrument(skip(self))]
    pub fn activate(&self, version_id: &str) -> Result<()> {
        self.load_bundle(version_id)?;
        let _guard = self.write_lock.lock();
        let mut manifest = self.manifest()?;
        manifest.activate(version_id, rfc3339(Utc::now()))?;
        manifest.write_to_path(self.manifest_path())?;
        info!(version = %version_id, "activated model version");
        Ok(())
    }

    /// Re-point to the previously active version; returns it
    #[instrument(skip(self))]
    pub fn rollback(&self) -> Result<String> {
        let _guard = self.write_lock.lock();
        let mut manifest = self.manifest()?;
        let from = manifest.current.clone();
        let to = manifest.rollback(rfc3339(Utc::now()))?;
        self.load_bundle(&to)?;
        manifest.write_to_path(self.manifest_path())?;
        info!(from = ?from, to = %to, "rolled back model version");
        Ok(to)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::new_version;
    use super::*;
    use chrono::TimeZone;

    fn clock(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn test_publish_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let version = store.publish_at(&new_version(-1.0), clock(0)).unwrap();

        assert_eq!(version.version_id, "v20260501T120000000Z");
        let vdir = dir.path().join("versions").join(&version.version_id);
        for file in [MODEL_FILE, SCHEMA_FILE, METRICS_FILE, VERSION_FILE, CARD_FILE] {
            assert!(vdir.join(file).exists(), "{file} missing");
        }
        let card = fs::read_to_string(vdir.join(CARD_FILE)).unwrap();
        assert!(card.contains("loan_grade"));
        assert!(card.contains("AUC-ROC"));

        // published, not activated
        let manifest = store.manifest().unwrap();
        assert_eq!(manifest.history, vec![version.version_id.clone()]);
        assert!(manifest.current.is_none());

        // no staging leftovers
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("versions"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_same_millisecond_publications_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let a = store.publish_at(&new_version(-1.0), clock(0)).unwrap();
        let b = store.publish_at(&new_version(-0.5), clock(0)).unwrap();
        assert!(a.version_id < b.version_id);
        assert_ne!(a.model.blake3, b.model.blake3);
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let new = new_version(-1.0);
        let version = store.publish_at(&new, clock(0)).unwrap();

        let bundle = store.load_bundle(&version.version_id).unwrap();
        assert_eq!(bundle.version_id(), version.version_id);
        assert_eq!(bundle.model(), &new.model);
        assert_eq!(bundle.schema(), &new.schema);
        assert_eq!(bundle.metrics(), Some(&new.metrics));
        assert_eq!(version.decision_threshold, 0.5);
    }

    #[test]
    fn test_tampered_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let version = store.publish_at(&new_version(-1.0), clock(0)).unwrap();

        let model_path = dir
            .path()
            .join("versions")
            .join(&version.version_id)
            .join(MODEL_FILE);
        let tampered = fs::read_to_string(&model_path).unwrap().replace("-1.0", "-2.0");
        fs::write(&model_path, tampered).unwrap();

        let err = store.load_bundle(&version.version_id).unwrap_err();
        assert!(matches!(err, RegistryError::ArtifactLoad { .. }));
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn test_mismatched_pair_never_published() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let mut new = new_version(-1.0);
        new.model.feature_names.reverse();

        assert!(store.publish_at(&new, clock(0)).is_err());
        assert!(store.manifest().unwrap().history.is_empty());
        assert_eq!(fs::read_dir(dir.path().join("versions")).unwrap().count(), 0);
    }

    #[test]
    fn test_activate_rollback_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let a = store.publish_at(&new_version(-1.0), clock(0)).unwrap();
        let b = store.publish_at(&new_version(-0.5), clock(10)).unwrap();

        assert!(matches!(
            store.activate("v19990101T000000000Z"),
            Err(RegistryError::VersionNotFound(_))
        ));
        store.activate(&a.version_id).unwrap();
        store.activate(&b.version_id).unwrap();
        assert_eq!(store.current().unwrap(), Some(b.version_id.clone()));

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(!listed[0].is_active);
        assert!(listed[1].is_active);
        assert_eq!(listed[1].auc_roc, Some(0.85));

        assert_eq!(store.rollback().unwrap(), a.version_id);
        assert_eq!(store.current().unwrap(), Some(a.version_id));
    }

    #[test]
    fn test_rollback_to_unloadable_version_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::open(dir.path()).unwrap();
        let a = store.publish_at(&new_version(-1.0), clock(0)).unwrap();
        let b = store.publish_at(&new_version(-0.5), clock(10)).unwrap();
        store.activate(&a.version_id).unwrap();
        store.activate(&b.version_id).unwrap();

        let model_path = dir
            .path()
            .join("versions")
            .join(&a.version_id)
            .join(MODEL_FILE);
        let bytes = fs::read(&model_path).unwrap();
        fs::write(&model_path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(store.rollback().is_err());
        assert_eq!(store.current().unwrap(), Some(b.version_id.clone()));
        let manifest = store.manifest().unwrap();
        assert_eq!(manifest.activations.len(), 2);
    }
}
