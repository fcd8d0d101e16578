//! Prediction service
//!
//! Ties the pieces together: every request scores against one snapshot of
//! the active bundle, explanations run after scoring, and training and
//! version management go through the on-disk version store.

use crate::config::ServiceConfig;
use crate::errors::{Result, ServiceError};
use crate::explain::{ExplanationBackend, ExplanationGenerator};
use crate::types::{BatchItem, BatchResponse, ErrorEntry, PredictionResponse};
use credit_risk_core::{
    validate_input, Imputer, LoanRecord, ModelBundle, RiskCoreError, RiskThresholds,
};
use credit_risk_registry::{
    ActiveModel, ModelVersion, ReloadResult, VersionStore, VersionSummary,
};
use credit_risk_trainer::{CancellationFlag, TabularDataset, TrainingPipeline, TrainingReport};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Loan default prediction service
pub struct RiskService {
    config: ServiceConfig,
    store: Arc<VersionStore>,
    active: Arc<ActiveModel>,
    explainer: ExplanationGenerator,
    imputer: Imputer,
    thresholds: RiskThresholds,
}

impl RiskService {
    /// Open the model directory, load the active version if there is one,
    /// and set up explanations from the configuration.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        let explainer = ExplanationGenerator::from_config(&config.llm)?;
        Self::with_explainer(config, explainer)
    }

    /// Like [`RiskService::open`] with a caller-supplied AI backend
    pub fn with_backend(
        config: ServiceConfig,
        backend: Option<Arc<dyn ExplanationBackend>>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.llm.timeout_seconds);
        Self::with_explainer(config, ExplanationGenerator::new(backend, timeout))
    }

    fn with_explainer(config: ServiceConfig, explainer: ExplanationGenerator) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(VersionStore::open(&config.registry.model_dir)?);
        let active = Arc::new(ActiveModel::new());

        let initial = active.reload(&store);
        match &initial.active_version {
            Some(version) => info!(version = %version, "serving model version"),
            None => warn!(
                error = initial.error.as_deref().unwrap_or("none"),
                "no model version loaded; predictions fail until one is activated"
            ),
        }

        Ok(Self {
            imputer: Imputer::new(config.imputation.min_historical_support),
            thresholds: config.thresholds,
            config,
            store,
            active,
            explainer,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Version currently serving, if any
    pub fn active_version(&self) -> Option<String> {
        self.active.version_id()
    }

    pub fn ai_explanations_enabled(&self) -> bool {
        self.explainer.has_ai_backend()
    }

    fn serving_bundle(&self) -> Result<Arc<ModelBundle>> {
        let bundle = self.active.snapshot().ok_or(ServiceError::ModelNotLoaded)?;
        if self.active.is_blocked() {
            return Err(ServiceError::ServingBlocked(bundle.version_id().to_string()));
        }
        Ok(bundle)
    }

    /// Score one possibly incomplete application
    #[instrument(skip(self, record))]
    pub async fn predict_single(
        &self,
        record: LoanRecord,
        include_explanation: bool,
    ) -> Result<PredictionResponse> {
        let bundle = self.serving_bundle()?;
        self.score(&bundle, record, include_explanation).await
    }

    /// Score many applications against one bundle.
    ///
    /// Rows run on a bounded pool and fail independently; `results` keeps
    /// input order.
    #[instrument(skip(self, records), fields(rows = records.len()))]
    pub async fn predict_batch(
        &self,
        records: Vec<LoanRecord>,
        include_explanation: bool,
    ) -> Result<BatchResponse> {
        let bundle = self.serving_bundle()?;
        let bundle = bundle.as_ref();
        let started = Instant::now();

        let items: Vec<BatchItem> = stream::iter(records.into_iter().enumerate())
            .map(move |(index, record)| async move {
                match self.score(bundle, record, include_explanation).await {
                    Ok(response) => BatchItem::Prediction(Box::new(response)),
                    Err(err) => BatchItem::Error(ErrorEntry {
                        index,
                        error: err.to_string(),
                    }),
                }
            })
            .buffered(self.config.batch.max_concurrency)
            .collect()
            .await;

        let response = BatchResponse::from_items(items);
        info!(
            successful = response.successful,
            failed = response.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch prediction finished"
        );
        Ok(response)
    }

    async fn score(
        &self,
        bundle: &ModelBundle,
        record: LoanRecord,
        include_explanation: bool,
    ) -> Result<PredictionResponse> {
        let validation_warnings = validate_input(&record, bundle.schema());

        let assessment = match bundle.assess(&record, &self.imputer, &self.thresholds) {
            Ok(assessment) => assessment,
            Err(RiskCoreError::SchemaMismatch(reason)) => {
                if self.active.version_id().as_deref() == Some(bundle.version_id()) {
                    self.active.mark_blocked(&reason);
                }
                return Err(ServiceError::SchemaMismatch(reason));
            }
            Err(err) => return Err(err.into()),
        };

        if !assessment.drift_warnings.is_empty() {
            warn!(
                version = bundle.version_id(),
                warnings = assessment.drift_warnings.len(),
                "input outside training distribution"
            );
        }

        let explanation = if include_explanation {
            Some(
                self.explainer
                    .explain(&assessment.result, &assessment.attributions, &record)
                    .await,
            )
        } else {
            None
        };

        let (llm_explanation, remediation_suggestion, explanation_source) = match explanation {
            Some(e) => (Some(e.narrative), e.remediation, Some(e.source)),
            None => (None, None, None),
        };

        Ok(PredictionResponse {
            risk_level: assessment.result.risk_level,
            probability_default_percent: assessment.result.percent(),
            binary_prediction: assessment.result.binary_label,
            imputation_log: assessment.imputation.log_lines(),
            input_features_imputed: assessment.imputation.record,
            input_features_original: record,
            shap_explanation: assessment.attributions,
            llm_explanation,
            remediation_suggestion,
            data_drift_warnings: assessment.drift_warnings,
            validation_warnings,
            explanation_source,
            model_version: bundle.version_id().to_string(),
        })
    }

    /// Train and publish a new version. The version is not activated.
    pub async fn train(
        &self,
        dataset: TabularDataset,
        target_hint: Option<String>,
    ) -> Result<TrainingReport> {
        self.train_with_cancel(dataset, target_hint, CancellationFlag::new())
            .await
    }

    /// [`RiskService::train`] with a cooperative cancellation flag
    #[instrument(skip_all, fields(rows = dataset.len()))]
    pub async fn train_with_cancel(
        &self,
        dataset: TabularDataset,
        target_hint: Option<String>,
        cancel: CancellationFlag,
    ) -> Result<TrainingReport> {
        let config = self.config.training.clone();
        let threshold = self.thresholds.decision_threshold;
        let store = Arc::clone(&self.store);

        let report = tokio::task::spawn_blocking(move || -> Result<TrainingReport> {
            let outcome = TrainingPipeline::new(config, threshold).run(
                &dataset,
                target_hint.as_deref(),
                &cancel,
            )?;
            let version = store.publish(&outcome.to_new_version())?;
            let mut report = outcome.report;
            report.version_id = Some(version.version_id);
            Ok(report)
        })
        .await??;

        info!(
            version = ?report.version_id,
            accuracy = report.metrics.accuracy,
            auc_roc = report.metrics.auc_roc,
            "published new model version"
        );
        Ok(report)
    }

    /// Swap in the manifest's current version. Never fails; the result says
    /// what happened.
    pub async fn reload_model(&self) -> ReloadResult {
        let active = Arc::clone(&self.active);
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || active.reload(&store)).await {
            Ok(result) => result,
            Err(err) => {
                let serving = self.active.version_id();
                ReloadResult {
                    success: false,
                    active_version: serving.clone(),
                    previous_version: serving,
                    changed: false,
                    error: Some(format!("reload task failed: {err}")),
                }
            }
        }
    }

    /// Point the manifest at `version_id` and reload
    pub async fn activate_version(&self, version_id: &str) -> Result<ReloadResult> {
        self.store.activate(version_id)?;
        info!(version = version_id, "activated model version");
        Ok(self.reload_model().await)
    }

    /// Re-activate the previously active version and reload
    pub async fn rollback(&self) -> Result<ReloadResult> {
        let version = self.store.rollback()?;
        info!(version = %version, "rolled back model version");
        Ok(self.reload_model().await)
    }

    pub fn list_versions(&self) -> Result<Vec<VersionSummary>> {
        Ok(self.store.list()?)
    }

    pub fn describe_version(&self, version_id: &str) -> Result<ModelVersion> {
        Ok(self.store.describe(version_id)?)
    }
}
