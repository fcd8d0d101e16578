//! GBDT model for binary default prediction
//!
//! Implements a binary-logistic tree ensemble with:
//! - Canonical JSON serialization
//! - Blake3 model hashing
//! - Exact path attribution (bias plus per-column contributions equals margin)

use super::tree::Tree;
use crate::errors::{Result, RiskCoreError};
use crate::serialization::{canonical_json_string, hash_canonical_hex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current model format version
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Margin-space attribution of a single prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Contributions {
    /// Expected margin before any split is applied
    pub bias: f64,
    /// One entry per encoded column
    pub values: Vec<f64>,
}

impl Contributions {
    /// Sum of bias and contributions, i.e. the model margin
    pub fn total(&self) -> f64 {
        self.bias + self.values.iter().sum::<f64>()
    }
}

/// Logistic GBDT model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtModel {
    /// Model format version
    pub version: u32,

    /// Initial log-odds added to every prediction
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Length of the expected feature vector
    pub feature_count: usize,

    /// Encoded column names the model was trained on
    pub feature_names: Vec<String>,
}

impl GbdtModel {
    pub fn new(base_score: f64, trees: Vec<Tree>, feature_names: Vec<String>) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            base_score,
            trees,
            feature_count: feature_names.len(),
            feature_names,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(RiskCoreError::InvalidModel(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(RiskCoreError::InvalidModel(
                "base score is not finite".to_string(),
            ));
        }

        if self.feature_names.len() != self.feature_count {
            return Err(RiskCoreError::InvalidModel(format!(
                "{} feature names for {} features",
                self.feature_names.len(),
                self.feature_count
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                RiskCoreError::InvalidModel(format!("Tree {i} validation failed: {e}"))
            })?;
        }

        Ok(())
    }

    fn check_input(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.feature_count {
            return Err(RiskCoreError::validation(
                "features",
                format!(
                    "expected {} values, got {}",
                    self.feature_count,
                    features.len()
                ),
            ));
        }
        if let Some(idx) = features.iter().position(|v| !v.is_finite()) {
            let name = self
                .feature_names
                .get(idx)
                .map(String::as_str)
                .unwrap_or("features");
            return Err(RiskCoreError::validation(name, "non-finite value"));
        }
        Ok(())
    }

    /// Raw log-odds for a feature vector
    pub fn margin(&self, features: &[f64]) -> Result<f64> {
        self.check_input(features)?;
        Ok(self.base_score
            + self
                .trees
                .iter()
                .map(|tree| tree.evaluate(features))
                .sum::<f64>())
    }

    /// Probability of default for a feature vector
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        Ok(sigmoid(self.margin(features)?))
    }

    /// Per-column margin attributions for a feature vector
    pub fn contributions(&self, features: &[f64]) -> Result<Contributions> {
        self.check_input(features)?;
        let mut values = vec![0.0; self.feature_count];
        let mut bias = self.base_score;
        for tree in &self.trees {
            bias += tree.path_contributions(features, &mut values);
        }
        Ok(Contributions { bias, values })
    }

    /// Get number of trees in the model
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Serialize model to canonical JSON (sorted keys)
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(canonical_json_string(self)?)
    }

    /// Compute model hash as hex string
    pub fn hash_hex(&self) -> Result<String> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load model from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let model: GbdtModel = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }
}

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Log-odds of a probability, clamped away from 0 and 1
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}
