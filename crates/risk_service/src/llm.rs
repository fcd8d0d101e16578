//! OpenAI-compatible chat completion client

use crate::config::LlmConfig;
use crate::errors::{ExplanationBackendError, Result, ServiceError};
use crate::explain::ExplanationBackend;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Chat completion client with bounded retries
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_endpoint.trim_end_matches('/')
        )
    }

    /// Delay before retry number `attempt` (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(factor))
    }

    async fn send_once(
        &self,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<String, Attempt> {
        let payload = json!({
            "model": self.config.model_name,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ExplanationBackendError::Http(format!("API request failed: {status} - {body}"));
            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(ExplanationBackendError::InvalidResponse(e.to_string())))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Attempt::Fatal(ExplanationBackendError::InvalidResponse(
                    "no content in response".to_string(),
                ))
            })
    }
}

/// Outcome of one failed request
enum Attempt {
    Retry(ExplanationBackendError),
    Fatal(ExplanationBackendError),
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ExplanationBackend for LlmClient {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<String, ExplanationBackendError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(system, prompt).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Retry(err)) => {
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "retrying completion request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
