//! Model version manager for loan default models
//!
//! Publishes trained model/schema/metrics triples as immutable, hashed
//! versions under a model directory, tracks which one is active in a
//! manifest, and serves the active bundle behind an atomically swappable
//! pointer.

pub mod active;
pub mod card;
pub mod errors;
pub mod manifest;
pub mod store;
pub mod version;

pub use active::{ActiveModel, ReloadResult};
pub use errors::{RegistryError, Result};
pub use manifest::{ActivationKind, ActivationRecord, Manifest};
pub use store::VersionStore;
pub use version::{ArtifactRef, ModelVersion, NewVersion, VersionSummary};
