//! Prediction engine

use crate::errors::Result;
use crate::gbdt::{Contributions, GbdtModel};

/// A model that scores encoded rows
pub trait Predictor: Send + Sync {
    /// Width of the encoded vector the model expects
    fn feature_count(&self) -> usize;

    /// Probability of default for one encoded row
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Raw per-column attributions for one encoded row
    fn attribute(&self, features: &[f64]) -> Result<Contributions>;
}

impl Predictor for GbdtModel {
    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        self.predict_proba(features)
    }

    fn attribute(&self, features: &[f64]) -> Result<Contributions> {
        self.contributions(features)
    }
}

/// Score many rows; a bad row yields its own error and the rest proceed.
pub fn predict_batch<P, R>(model: &P, rows: &[R]) -> Vec<Result<f64>>
where
    P: Predictor + ?Sized,
    R: AsRef<[f64]>,
{
    rows.iter().map(|row| model.predict(row.as_ref())).collect()
}
