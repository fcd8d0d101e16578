//! Model bundle
//!
//! A bundle pairs one model with the schema it was trained against. It is
//! the unit that gets swapped on reload, so a request always sees a schema
//! and a model from the same version.

use crate::attribution::{aggregate, AttributionMap};
use crate::encoder::{check_model, encode, numeric_drift_warnings, EncodedRow};
use crate::errors::{Result, RiskCoreError};
use crate::gbdt::GbdtModel;
use crate::imputation::{ImputationOutcome, Imputer};
use crate::metrics::MetricsSnapshot;
use crate::prediction::Predictor;
use crate::record::LoanRecord;
use crate::risk::{PredictionResult, RiskThresholds};
use crate::schema::FeatureSchema;

/// Everything learned about one scored record
#[derive(Debug, Clone)]
pub struct Assessment {
    pub imputation: ImputationOutcome,
    pub encoded: EncodedRow,
    pub result: PredictionResult,
    pub attributions: AttributionMap,
    /// Unseen categories followed by out-of-range numeric inputs
    pub drift_warnings: Vec<String>,
}

/// An immutable model + schema pairing
#[derive(Debug, Clone)]
pub struct ModelBundle {
    version_id: String,
    model: GbdtModel,
    schema: FeatureSchema,
    metrics: Option<MetricsSnapshot>,
}

impl ModelBundle {
    /// Pair a model with its schema; fails on any inconsistency.
    pub fn new(
        version_id: impl Into<String>,
        model: GbdtModel,
        schema: FeatureSchema,
        metrics: Option<MetricsSnapshot>,
    ) -> Result<Self> {
        model.validate()?;
        schema.validate()?;
        check_model(&schema, model.feature_count)?;
        if model.feature_names != schema.feature_names {
            return Err(RiskCoreError::SchemaMismatch(
                "model and schema list different feature names".to_string(),
            ));
        }
        Ok(Self {
            version_id: version_id.into(),
            model,
            schema,
            metrics,
        })
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn model(&self) -> &GbdtModel {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }

    /// Impute, encode, predict, attribute and classify one record.
    pub fn assess(
        &self,
        record: &LoanRecord,
        imputer: &Imputer,
        thresholds: &RiskThresholds,
    ) -> Result<Assessment> {
        let imputation = imputer.impute(record, &self.schema);
        let encoded = encode(&imputation.record, &self.schema)?;
        let probability = self.model.predict(&encoded.values)?;
        let raw = self.model.attribute(&encoded.values)?;
        let attributions = aggregate(&raw, &self.schema)?;

        let mut drift_warnings = encoded.drift_warnings.clone();
        drift_warnings.extend(numeric_drift_warnings(record, &self.schema));

        Ok(Assessment {
            imputation,
            encoded,
            result: thresholds.classify(probability),
            attributions,
            drift_warnings,
        })
    }
}
