//! Training pipeline
//!
//! detect target -> normalize target -> partition columns -> check data
//! -> fit schema -> stratified split -> boost -> evaluate
//!
//! Cancellation is cooperative: the flag is checked between stages and
//! between boosting rounds. Nothing is persisted here; publishing the
//! outcome is the version store's job.

use crate::dataset::TabularDataset;
use crate::detection::{partition_columns, TargetDetector};
use crate::deterministic::stratified_split;
use crate::errors::{Result, TrainerError};
use crate::metrics::evaluate;
use crate::normalize::TargetNormalizer;
use crate::preprocess::{build_matrix, fit_schema};
use crate::trainer::{CancellationFlag, GbdtConfig, GbdtTrainer};
use credit_risk_core::{FeatureSchema, FieldKind, FieldSpec, GbdtModel, MetricsSnapshot, Predictor};
use credit_risk_registry::NewVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument};

/// Pipeline settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of each class held out for evaluation
    pub test_ratio: f64,
    pub seed: i64,
    /// Minimum rows left after target cleaning
    pub min_rows: usize,
    /// Minimum rows of the rarer class
    pub min_class_count: usize,
    #[serde(flatten)]
    pub gbdt: GbdtConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            min_rows: 100,
            min_class_count: 10,
            gbdt: GbdtConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(TrainerError::Training(format!(
                "test_ratio {} outside (0, 1)",
                self.test_ratio
            )));
        }
        self.gbdt.validate()
    }
}

/// Summary returned to the training caller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Filled in once the version is published
    pub version_id: Option<String>,
    pub target: String,
    pub target_mapping: BTreeMap<String, u8>,
    /// Fields of the published schema, by kind
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub rows_after_cleaning: usize,
    pub dropped_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_count: usize,
    pub metrics: MetricsSnapshot,
    pub duration_ms: u64,
}

/// Trained artifacts plus the report describing them
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub model: GbdtModel,
    pub schema: FeatureSchema,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    /// Artifacts to hand to the version store
    pub fn to_new_version(&self) -> NewVersion {
        NewVersion {
            model: self.model.clone(),
            schema: self.schema.clone(),
            metrics: self.report.metrics.clone(),
            target_mapping: self.report.target_mapping.clone(),
            dropped_rows: self.report.dropped_rows,
        }
    }
}

/// Dataset-to-model pipeline
pub struct TrainingPipeline {
    config: TrainingConfig,
    decision_threshold: f64,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig, decision_threshold: f64) -> Self {
        Self {
            config,
            decision_threshold,
        }
    }

    #[instrument(skip_all, fields(rows = dataset.len(), columns = dataset.columns.len()))]
    pub fn run(
        &self,
        dataset: &TabularDataset,
        target_hint: Option<&str>,
        cancel: &CancellationFlag,
    ) -> Result<TrainingOutcome> {
        let started = Instant::now();
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(TrainerError::InsufficientData("dataset has no rows".to_string()));
        }

        cancel.check("target detection")?;
        let target = TargetDetector::standard(target_hint.map(str::to_string)).detect(dataset)?;

        cancel.check("target normalization")?;
        let normalized = TargetNormalizer.normalize(dataset, &target)?;
        let kept: Vec<usize> = normalized
            .labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| label.map(|_| i))
            .collect();
        let labels: Vec<u8> = normalized.labels.iter().flatten().copied().collect();
        info!(
            target = %target,
            kept = kept.len(),
            dropped = normalized.dropped_rows,
            "normalized target"
        );

        cancel.check("column partitioning")?;
        let partition = partition_columns(dataset, &target);

        self.check_data(&labels)?;

        cancel.check("schema fitting")?;
        let schema = fit_schema(
            dataset,
            &target,
            &partition.numeric,
            &partition.categorical,
            &kept,
        )?;
        let matrix = build_matrix(dataset, &schema, &kept)?;
        info!(features = schema.feature_count(), "fitted feature schema");

        cancel.check("train/test split")?;
        let split = stratified_split(&labels, self.config.test_ratio, self.config.seed);
        let select = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<u8>) {
            idx.iter()
                .map(|&i| (matrix[i].clone(), labels[i]))
                .unzip()
        };
        let (train_x, train_y) = select(&split.train);
        let (test_x, test_y) = select(&split.test);

        info!(
            train = train_x.len(),
            test = test_x.len(),
            trees = self.config.gbdt.num_trees,
            "training model"
        );
        let model = GbdtTrainer::new(self.config.gbdt.clone()).train(
            &train_x,
            &train_y,
            schema.feature_names.clone(),
            cancel,
        )?;

        cancel.check("evaluation")?;
        let probabilities = test_x
            .iter()
            .map(|row| model.predict(row))
            .collect::<credit_risk_core::Result<Vec<f64>>>()?;
        let positive_rate = labels.iter().filter(|&&y| y == 1).count() as f64 / labels.len() as f64;
        let metrics = evaluate(
            &test_y,
            &probabilities,
            self.decision_threshold,
            train_x.len(),
            positive_rate,
        );
        info!(
            accuracy = metrics.accuracy,
            auc_roc = metrics.auc_roc,
            f1 = metrics.f1,
            "evaluated model"
        );

        let (numeric_features, categorical_features): (Vec<_>, Vec<_>) = schema
            .fields
            .iter()
            .partition(|spec| matches!(spec.kind, FieldKind::Numeric(_)));
        let names = |specs: Vec<&FieldSpec>| -> Vec<String> {
            specs.into_iter().map(|spec| spec.name.clone()).collect()
        };

        let report = TrainingReport {
            version_id: None,
            target,
            target_mapping: normalized.mapping,
            numeric_features: names(numeric_features),
            categorical_features: names(categorical_features),
            rows_after_cleaning: kept.len(),
            dropped_rows: normalized.dropped_rows,
            train_rows: train_x.len(),
            test_rows: test_x.len(),
            feature_count: schema.feature_count(),
            metrics,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        Ok(TrainingOutcome {
            model,
            schema,
            report,
        })
    }

    fn check_data(&self, labels: &[u8]) -> Result<()> {
        if labels.len() < self.config.min_rows {
            return Err(TrainerError::InsufficientData(format!(
                "{} rows after cleaning, need at least {}",
                labels.len(),
                self.config.min_rows
            )));
        }
        let positives = labels.iter().filter(|&&y| y == 1).count();
        let minority = positives.min(labels.len() - positives);
        if minority < self.config.min_class_count.max(2) {
            return Err(TrainerError::InsufficientData(format!(
                "rarer class has {} rows, need at least {}",
                minority,
                self.config.min_class_count.max(2)
            )));
        }
        Ok(())
    }
}
