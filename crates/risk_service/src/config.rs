//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every section has defaults, so an empty file (or no file)
//! is a valid configuration.

use crate::errors::{Result, ServiceError};
use credit_risk_core::RiskThresholds;
use credit_risk_trainer::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where model versions live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub model_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Minimum training support before a historical statistic is used
    pub min_historical_support: usize,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            min_historical_support: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows scored concurrently within one batch
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// AI text-completion backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended
    pub api_endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Bound on the whole AI stage, retries included
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// First retry delay; doubles on every further retry
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_endpoint: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model_name: "mistralai/mistral-7b-instruct:free".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            timeout_seconds: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl LlmConfig {
    /// Enabled and holding a key
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub registry: RegistryConfig,
    pub thresholds: RiskThresholds,
    pub imputation: ImputationConfig,
    pub batch: BatchConfig,
    pub training: TrainingConfig,
    pub llm: LlmConfig,
}

impl ServiceConfig {
    /// File (if any), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("failed to parse config file: {e}")))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Unparseable values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = var("CREDIT_RISK_MODEL_DIR") {
            self.registry.model_dir = PathBuf::from(value);
        }

        if let Some(value) = var("CREDIT_RISK_DECISION_THRESHOLD") {
            if let Ok(parsed) = value.parse::<f64>() {
                self.thresholds.decision_threshold = parsed;
            }
        }

        if let Some(value) = var("CREDIT_RISK_BATCH_CONCURRENCY") {
            if let Ok(parsed) = value.parse::<usize>() {
                self.batch.max_concurrency = parsed;
            }
        }

        if let Some(value) = var("ENABLE_AI_EXPLANATIONS") {
            if let Some(parsed) = parse_bool(&value) {
                self.llm.enabled = parsed;
            }
        }

        if let Some(value) = var("LLM_API_ENDPOINT") {
            self.llm.api_endpoint = value;
        }

        if let Some(value) = var("LLM_API_KEY") {
            self.llm.api_key = value;
        }

        if let Some(value) = var("LLM_MODEL") {
            self.llm.model_name = value;
        }

        if let Some(value) = var("LLM_TIMEOUT") {
            if let Ok(parsed) = value.parse::<u64>() {
                self.llm.timeout_seconds = parsed;
            }
        }

        if let Some(value) = var("LLM_MAX_RETRIES") {
            if let Ok(parsed) = value.parse::<u32>() {
                self.llm.max_retries = parsed;
            }
        }

        debug!(
            model_dir = %self.registry.model_dir.display(),
            ai_explanations = self.llm.is_configured(),
            "applied environment overrides"
        );
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        if self.batch.max_concurrency == 0 {
            return Err(ServiceError::Config(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }
        self.training
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        if self.llm.enabled && self.llm.timeout_seconds == 0 {
            return Err(ServiceError::Config(
                "llm.timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tolerant boolean parsing for environment values
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("y")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("n")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}
