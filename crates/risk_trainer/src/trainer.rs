//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Binary logistic boosting: each round fits a regression tree to the
//! gradient g = p - y and hessian h = p(1 - p) of the log loss.

use credit_risk_core::gbdt::{logit, sigmoid};
use credit_risk_core::{GbdtModel, Tree};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::cart::{CartBuilder, FeatureBins, TreeConfig};
use crate::errors::{Result, TrainerError};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub learning_rate: f64,
    pub lambda: f64,
    pub max_bins: usize,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            min_samples_leaf: 5,
            min_child_weight: 1e-3,
            learning_rate: 0.1,
            lambda: 1.0,
            max_bins: 64,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 || self.max_bins < 2 {
            return Err(TrainerError::Training(
                "num_trees must be positive and max_bins at least 2".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TrainerError::Training(format!(
                "learning_rate {} outside (0, 1]",
                self.learning_rate
            )));
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(TrainerError::Training(
                "lambda and min_child_weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf.max(1),
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            min_split_gain: 0.0,
            learning_rate: self.learning_rate,
        }
    }
}

/// Cooperative cancellation shared with the caller
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error out if cancellation was requested
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(TrainerError::Cancelled {
                stage: stage.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train a model on an encoded matrix with binary labels
    pub fn train(
        &self,
        features: &[Vec<f64>],
        labels: &[u8],
        feature_names: Vec<String>,
        cancel: &CancellationFlag,
    ) -> Result<GbdtModel> {
        self.config.validate()?;
        if features.is_empty() || features.len() != labels.len() {
            return Err(TrainerError::Training(format!(
                "{} rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        let feature_count = feature_names.len();
        if features.iter().any(|row| row.len() != feature_count) {
            return Err(TrainerError::Training(format!(
                "every row must have {feature_count} features"
            )));
        }

        let positive_rate = labels.iter().filter(|&&y| y == 1).count() as f64 / labels.len() as f64;
        let base_score = logit(positive_rate);

        let bins = FeatureBins::fit(features, feature_count, self.config.max_bins);
        let binned = bins.bin_matrix(features);
        let tree_config = self.config.tree_config();
        let rows: Vec<usize> = (0..features.len()).collect();

        let mut margins = vec![base_score; features.len()];
        let mut gradients = vec![0.0; features.len()];
        let mut hessians = vec![0.0; features.len()];
        let mut trees: Vec<Tree> = Vec::with_capacity(self.config.num_trees);

        for tree_idx in 0..self.config.num_trees {
            cancel.check("boosting")?;

            for i in 0..features.len() {
                let p = sigmoid(margins[i]);
                gradients[i] = p - f64::from(labels[i]);
                hessians[i] = (p * (1.0 - p)).max(1e-12);
            }

            let builder = CartBuilder::new(&tree_config, &bins, &binned, &gradients, &hessians);
            let tree = builder.build(&rows);

            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += tree.evaluate(row);
            }

            debug!(
                tree = tree_idx + 1,
                of = self.config.num_trees,
                leaves = tree.leaf_count(),
                logloss = log_loss(labels, &margins),
                "boosting round complete"
            );
            trees.push(tree);
        }

        let model = GbdtModel::new(base_score, trees, feature_names);
        model.validate()?;
        Ok(model)
    }
}

/// Mean binary cross-entropy of margins against labels
pub fn log_loss(labels: &[u8], margins: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .zip(margins)
        .map(|(&y, &m)| {
            let p = sigmoid(m).clamp(1e-15, 1.0 - 1e-15);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}
