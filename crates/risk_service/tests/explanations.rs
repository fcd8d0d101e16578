//! AI explanation stage against a stand-in completion endpoint

mod common;

use common::{risky_applicant, test_config, train_and_activate};
use credit_risk_service::{rules, ExplanationSource, LlmConfig, RiskService, ServiceConfig};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ai_config(model_dir: &Path, server: &MockServer) -> ServiceConfig {
    let mut config = test_config(model_dir);
    config.llm = LlmConfig {
        enabled: true,
        api_endpoint: format!("{}/v1", server.uri()),
        api_key: "test-key".to_string(),
        model_name: "test-model".to_string(),
        timeout_seconds: 2,
        max_retries: 1,
        retry_backoff_ms: 10,
        ..LlmConfig::default()
    };
    config
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }
        ]
    })
}

#[tokio::test]
async fn test_structured_ai_reply_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Here is my analysis:\n{\"explanation\": \"The high interest rate drives the risk.\", \"remediation_suggestion\": \"Offer a lower rate with collateral.\"}",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = RiskService::open(ai_config(dir.path(), &server)).unwrap();
    assert!(service.ai_explanations_enabled());
    train_and_activate(&service, 7).await;

    let response = service.predict_single(risky_applicant(), true).await.unwrap();

    assert_eq!(response.explanation_source, Some(ExplanationSource::Ai));
    assert_eq!(
        response.llm_explanation.as_deref(),
        Some("The high interest rate drives the risk.")
    );
    assert_eq!(
        response.remediation_suggestion.as_deref(),
        Some("Offer a lower rate with collateral.")
    );

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "system");
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("High risk"));
    assert!(prompt.contains("loan_int_rate"));
}

#[tokio::test]
async fn test_disabled_explanations_make_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = RiskService::open(ai_config(dir.path(), &server)).unwrap();
    train_and_activate(&service, 7).await;

    let response = service.predict_single(risky_applicant(), false).await.unwrap();
    assert!(response.llm_explanation.is_none());
    assert!(response.remediation_suggestion.is_none());

    let batch = service
        .predict_batch(vec![risky_applicant(), risky_applicant()], false)
        .await
        .unwrap();
    assert_eq!(batch.successful, 2);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = RiskService::open(ai_config(dir.path(), &server)).unwrap();
    train_and_activate(&service, 7).await;

    let response = service.predict_single(risky_applicant(), true).await.unwrap();

    assert_eq!(response.explanation_source, Some(ExplanationSource::RuleBased));
    let narrative = response.llm_explanation.unwrap();
    assert!(narrative.contains("**high risk**"));
    assert!(narrative.ends_with(rules::FALLBACK_NOTE));
    assert!(response.remediation_suggestion.is_some());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = RiskService::open(ai_config(dir.path(), &server)).unwrap();
    train_and_activate(&service, 7).await;

    let response = service.predict_single(risky_applicant(), true).await.unwrap();
    assert_eq!(response.explanation_source, Some(ExplanationSource::RuleBased));
}

#[tokio::test]
async fn test_slow_backend_times_out_to_rules() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("too late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ai_config(dir.path(), &server);
    config.llm.timeout_seconds = 1;
    config.llm.max_retries = 0;
    let service = RiskService::open(config).unwrap();
    train_and_activate(&service, 7).await;

    let started = std::time::Instant::now();
    let response = service.predict_single(risky_applicant(), true).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.explanation_source, Some(ExplanationSource::RuleBased));
    assert!(response.llm_explanation.unwrap().ends_with(rules::FALLBACK_NOTE));
}

#[tokio::test]
async fn test_missing_api_key_means_rule_based() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = ai_config(dir.path(), &server);
    config.llm.api_key = String::new();
    let service = RiskService::open(config).unwrap();
    assert!(!service.ai_explanations_enabled());
    train_and_activate(&service, 7).await;

    let response = service.predict_single(risky_applicant(), true).await.unwrap();
    assert_eq!(response.explanation_source, Some(ExplanationSource::RuleBased));
    assert!(server.received_requests().await.unwrap().is_empty());
}
