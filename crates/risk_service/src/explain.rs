//! Explanation generator
//!
//! Two stages: an AI text-completion backend when one is configured, bounded
//! by a timeout, then the rule-based generator in [`crate::rules`]. The
//! second stage always succeeds, so [`ExplanationGenerator::explain`] never
//! returns an error.

use crate::config::LlmConfig;
use crate::errors::{ExplanationBackendError, Result};
use crate::llm::LlmClient;
use crate::rules;
use async_trait::async_trait;
use credit_risk_core::{AttributionMap, LoanRecord, PredictionResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// System prompt for every AI explanation request
pub const SYSTEM_PROMPT: &str =
    "You are a friendly, expert financial analyst explaining complex risk to a non-expert.";

/// Attribution entries quoted in the AI prompt
const PROMPT_TOP_FACTORS: usize = 5;

static JSON_OBJECT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Prompt-in, text-out completion service
#[async_trait]
pub trait ExplanationBackend: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<String, ExplanationBackendError>;
}

/// Which stage produced an explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationSource {
    Ai,
    RuleBased,
}

/// Narrative plus suggested next steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub narrative: String,
    pub remediation: Option<String>,
    pub source: ExplanationSource,
    /// Why the AI stage was skipped or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Fields of a structured AI reply
#[derive(Debug, Default, Deserialize)]
struct AiReply {
    #[serde(alias = "explanation_text")]
    explanation: Option<String>,
    #[serde(alias = "remediation")]
    remediation_suggestion: Option<String>,
}

pub struct ExplanationGenerator {
    backend: Option<Arc<dyn ExplanationBackend>>,
    timeout: Duration,
}

impl ExplanationGenerator {
    pub fn new(backend: Option<Arc<dyn ExplanationBackend>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Rule-based only; never touches the network
    pub fn rule_based() -> Self {
        Self::new(None, Duration::from_secs(LlmConfig::default().timeout_seconds))
    }

    /// AI stage when the configuration enables it and carries a key
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        if !config.is_configured() {
            debug!("AI explanations not configured; using rule-based explanations");
            return Ok(Self::new(None, timeout));
        }
        let client = LlmClient::new(config.clone())?;
        Ok(Self::new(Some(Arc::new(client)), timeout))
    }

    pub fn has_ai_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Explain one scored record. Falls back to the rules on any AI failure.
    pub async fn explain(
        &self,
        result: &PredictionResult,
        attributions: &AttributionMap,
        record: &LoanRecord,
    ) -> Explanation {
        let Some(backend) = &self.backend else {
            return fallback(result, attributions, record, ExplanationBackendError::Disabled);
        };

        let attempt = timeout(
            self.timeout,
            ai_explanation(backend.as_ref(), result, attributions, record),
        )
        .await
        .map_err(ExplanationBackendError::from)
        .and_then(|inner| inner);

        match attempt {
            Ok(explanation) => explanation,
            Err(err) => {
                warn!(error = %err, "AI explanation failed; using rule-based explanation");
                fallback(result, attributions, record, err)
            }
        }
    }
}

async fn ai_explanation(
    backend: &dyn ExplanationBackend,
    result: &PredictionResult,
    attributions: &AttributionMap,
    record: &LoanRecord,
) -> std::result::Result<Explanation, ExplanationBackendError> {
    let prompt = build_prompt(result, attributions, record);
    let reply = backend.complete(SYSTEM_PROMPT, &prompt).await?;
    let (narrative, remediation) = parse_reply(&reply)?;

    Ok(Explanation {
        narrative,
        remediation: remediation.or_else(|| rules::remediation(attributions, record)),
        source: ExplanationSource::Ai,
        fallback_reason: None,
    })
}

fn fallback(
    result: &PredictionResult,
    attributions: &AttributionMap,
    record: &LoanRecord,
    reason: ExplanationBackendError,
) -> Explanation {
    Explanation {
        narrative: rules::narrative(result, attributions, record),
        remediation: rules::remediation(attributions, record),
        source: ExplanationSource::RuleBased,
        fallback_reason: Some(reason.to_string()),
    }
}

/// Structured prompt from the outcome, strongest attributions and raw input
pub fn build_prompt(
    result: &PredictionResult,
    attributions: &AttributionMap,
    record: &LoanRecord,
) -> String {
    let factors: Vec<String> = attributions
        .top(PROMPT_TOP_FACTORS)
        .iter()
        .map(|(field, value)| {
            let direction = if *value >= 0.0 {
                "increases risk"
            } else {
                "decreases risk"
            };
            format!("- {field}: {value:+.4} ({direction})")
        })
        .collect();

    let applicant: Vec<String> = record
        .iter()
        .filter(|(_, value)| !value.is_absent())
        .map(|(field, value)| format!("{field}={value}"))
        .collect();

    format!(
        "You are an expert Credit Risk Analyst. Explain the decision for this loan application \
         in a concise, single paragraph suitable for a bank client.\n\n\
         The predicted outcome is: {level} risk ({percent:.1}% probability of default).\n\n\
         The top {count} most impactful features (attribution values, positive means higher risk) are:\n\
         {factors}\n\n\
         The raw applicant data is: {applicant}\n\n\
         Focus on summarizing why the loan was approved or rejected based on these factors.\n\
         Reply with a JSON object with the keys \"explanation\" (the paragraph) and \
         \"remediation_suggestion\" (one or two concrete steps the lender could take).",
        level = result.risk_level,
        percent = result.percent(),
        count = factors.len(),
        factors = factors.join("\n"),
        applicant = applicant.join(", "),
    )
}

/// Narrative and optional remediation from an AI reply.
///
/// A JSON object anywhere in the text wins; otherwise the whole text is the
/// narrative.
pub fn parse_reply(
    text: &str,
) -> std::result::Result<(String, Option<String>), ExplanationBackendError> {
    let structured = JSON_OBJECT
        .as_ref()
        .and_then(|re| re.find(text))
        .and_then(|found| serde_json::from_str::<AiReply>(found.as_str()).ok())
        .unwrap_or_default();

    let non_empty = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let remediation = non_empty(structured.remediation_suggestion);
    let narrative = non_empty(structured.explanation)
        .or_else(|| non_empty(Some(text.to_string())))
        .ok_or_else(|| ExplanationBackendError::InvalidResponse("empty completion".to_string()))?;

    Ok((narrative, remediation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_risk_core::RiskThresholds;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: std::result::Result<String, ExplanationBackendError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Canned {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExplanationBackend for Canned {
        async fn complete(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> std::result::Result<String, ExplanationBackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn inputs() -> (PredictionResult, AttributionMap, LoanRecord) {
        let result = RiskThresholds::default().classify(0.72);
        let attributions = AttributionMap::from_entries(
            -1.2,
            vec![
                ("loan_int_rate".to_string(), 0.8),
                ("loan_grade".to_string(), 0.3),
                ("person_income".to_string(), -0.2),
            ],
        );
        let record = LoanRecord::new()
            .with("person_income", 30_000.0)
            .with("loan_amnt", 15_000.0)
            .with("loan_int_rate", 16.0);
        (result, attributions, record)
    }

    #[test]
    fn test_parse_structured_reply() {
        let reply = "Sure! Here you go:\n```json\n{\"explanation\": \"Rate is high.\", \"remediation_suggestion\": \"Lower the rate.\"}\n```";
        let (narrative, remediation) = parse_reply(reply).unwrap();
        assert_eq!(narrative, "Rate is high.");
        assert_eq!(remediation.as_deref(), Some("Lower the rate."));
    }

    #[test]
    fn test_parse_alias_keys_and_plain_text() {
        let (narrative, remediation) =
            parse_reply(r#"{"explanation_text": "Fine.", "remediation": "None needed."}"#).unwrap();
        assert_eq!(narrative, "Fine.");
        assert_eq!(remediation.as_deref(), Some("None needed."));

        let (narrative, remediation) = parse_reply("  Just prose.  ").unwrap();
        assert_eq!(narrative, "Just prose.");
        assert!(remediation.is_none());

        assert!(matches!(
            parse_reply("   "),
            Err(ExplanationBackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_prompt_lists_signed_factors() {
        let (result, attributions, record) = inputs();
        let prompt = build_prompt(&result, &attributions, &record);
        assert!(prompt.contains("The predicted outcome is: High risk (72.0% probability of default)"));
        assert!(prompt.contains("- loan_int_rate: +0.8000 (increases risk)"));
        assert!(prompt.contains("- person_income: -0.2000 (decreases risk)"));
        assert!(prompt.contains("loan_amnt=15000"));
    }

    #[tokio::test]
    async fn test_ai_reply_without_remediation_uses_rules() {
        let (result, attributions, record) = inputs();
        let backend = Arc::new(Canned::replying("The interest rate drives this decision."));
        let shared: Arc<dyn ExplanationBackend> = backend.clone();
        let generator = ExplanationGenerator::new(Some(shared), Duration::from_secs(5));

        let explanation = generator.explain(&result, &attributions, &record).await;

        assert_eq!(explanation.source, ExplanationSource::Ai);
        assert_eq!(explanation.narrative, "The interest rate drives this decision.");
        assert_eq!(
            explanation.remediation,
            rules::remediation(&attributions, &record)
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_error_falls_back() {
        let (result, attributions, record) = inputs();
        let backend: Arc<dyn ExplanationBackend> = Arc::new(Canned {
            reply: Err(ExplanationBackendError::Http("503".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        });
        let generator = ExplanationGenerator::new(Some(backend), Duration::from_secs(5));

        let explanation = generator.explain(&result, &attributions, &record).await;

        assert_eq!(explanation.source, ExplanationSource::RuleBased);
        assert!(explanation.narrative.ends_with(rules::FALLBACK_NOTE));
        assert_eq!(explanation.fallback_reason.as_deref(), Some("HTTP error: 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let (result, attributions, record) = inputs();
        let backend: Arc<dyn ExplanationBackend> = Arc::new(Canned {
            reply: Ok("late".to_string()),
            delay: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
        });
        let generator = ExplanationGenerator::new(Some(backend), Duration::from_secs(2));

        let explanation = generator.explain(&result, &attributions, &record).await;

        assert_eq!(explanation.source, ExplanationSource::RuleBased);
        assert_eq!(explanation.fallback_reason.as_deref(), Some("timed out"));
    }

    #[tokio::test]
    async fn test_rule_based_generator() {
        let (result, attributions, record) = inputs();
        let generator = ExplanationGenerator::rule_based();
        assert!(!generator.has_ai_backend());

        let explanation = generator.explain(&result, &attributions, &record).await;
        assert_eq!(explanation.source, ExplanationSource::RuleBased);
        assert!(explanation.remediation.is_some());
    }
}
