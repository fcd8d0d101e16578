//! Hot-swappable active model bundle
//!
//! Requests take a snapshot (`Arc` clone) and score against it for their
//! whole lifetime. A reload builds the replacement bundle completely
//! before the swap, so a request sees either the old bundle or the new
//! one, never a mix.

use crate::errors::{RegistryError, Result};
use crate::store::VersionStore;
use credit_risk_core::ModelBundle;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome of a reload request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadResult {
    pub success: bool,
    /// Version serving after the call
    pub active_version: Option<String>,
    /// Version serving before the call
    pub previous_version: Option<String>,
    pub changed: bool,
    pub error: Option<String>,
}

/// Currently served bundle
#[derive(Default)]
pub struct ActiveModel {
    bundle: RwLock<Option<Arc<ModelBundle>>>,
    blocked: AtomicBool,
    /// Serialises reloads; scoring never takes this
    reload_lock: Mutex<()>,
}

impl ActiveModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start serving a bundle that was already validated
    pub fn with_bundle(bundle: ModelBundle) -> Self {
        let active = Self::new();
        active.install(Arc::new(bundle));
        active
    }

    /// Bundle to score one request with
    pub fn snapshot(&self) -> Option<Arc<ModelBundle>> {
        self.bundle.read().clone()
    }

    pub fn version_id(&self) -> Option<String> {
        self.bundle.read().as_ref().map(|b| b.version_id().to_string())
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Stop serving the current bundle until the next successful reload
    pub fn mark_blocked(&self, reason: &str) {
        if !self.blocked.swap(true, Ordering::SeqCst) {
            error!(version = ?self.version_id(), reason, "blocking model bundle");
        }
    }

    fn install(&self, bundle: Arc<ModelBundle>) {
        *self.bundle.write() = Some(bundle);
        self.blocked.store(false, Ordering::SeqCst);
    }

    /// Load the manifest's current version and swap it in.
    ///
    /// Reloading the version already being served is a successful no-op
    /// unless the bundle is blocked. Any failure leaves the previous bundle
    /// serving.
    #[instrument(skip_all)]
    pub fn reload(&self, store: &VersionStore) -> ReloadResult {
        let _guard = self.reload_lock.lock();
        let previous = self.version_id();

        match self.try_reload(store, previous.as_deref()) {
            Ok(changed) => {
                let active = self.version_id();
                if changed {
                    info!(from = ?previous, to = ?active, "reloaded model bundle");
                }
                ReloadResult {
                    success: true,
                    active_version: active,
                    previous_version: previous,
                    changed,
                    error: None,
                }
            }
            Err(err) => {
                warn!(error = %err, serving = ?previous, "model reload failed");
                ReloadResult {
                    success: false,
                    active_version: previous.clone(),
                    previous_version: previous,
                    changed: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn try_reload(&self, store: &VersionStore, serving: Option<&str>) -> Result<bool> {
        let target = store.current()?.ok_or(RegistryError::NoActiveVersion)?;
        if serving == Some(target.as_str()) && !self.is_blocked() {
            return Ok(false);
        }
        let bundle = store.load_bundle(&target)?;
        self.install(Arc::new(bundle));
        Ok(serving != Some(target.as_str()))
    }
}
