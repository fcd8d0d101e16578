//! Shared fixtures: a synthetic loan book and a service with a trained,
//! active model.

#![allow(dead_code)]

use credit_risk_service::{LoanRecord, LlmConfig, RiskService, ServiceConfig, TabularDataset};
use credit_risk_trainer::{GbdtConfig, LcgRng, TrainingConfig};
use std::path::Path;

const GRADES: [&str; 4] = ["A", "B", "C", "D"];
const HOMES: [&str; 3] = ["RENT", "OWN", "MORTGAGE"];

/// Defaults when the rate is high or the loan is large relative to income
pub fn loan_book(rows: usize, seed: i64) -> Vec<LoanRecord> {
    let mut rng = LcgRng::new(seed);
    (0..rows)
        .map(|_| {
            let income = 20000.0 + rng.next_range(80) as f64 * 1000.0;
            let amount = 1000.0 + rng.next_range(30) as f64 * 500.0;
            let rate = 5.0 + rng.next_range(1800) as f64 / 100.0;
            let grade = GRADES[((rate - 5.0) / 4.6) as usize];
            let home = HOMES[rng.next_range(HOMES.len())];
            let defaulted = rate > 15.0 || amount / income > 0.45;
            LoanRecord::new()
                .with("person_income", income)
                .with("loan_amnt", amount)
                .with("loan_int_rate", rate)
                .with("loan_grade", grade)
                .with("person_home_ownership", home)
                .with("loan_status", if defaulted { 1.0 } else { 0.0 })
        })
        .collect()
}

pub fn loan_dataset(rows: usize, seed: i64) -> TabularDataset {
    TabularDataset::from_records(&loan_book(rows, seed))
}

/// Fast training settings and AI explanations switched off
pub fn test_config(model_dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.registry.model_dir = model_dir.to_path_buf();
    config.training = TrainingConfig {
        gbdt: GbdtConfig {
            num_trees: 30,
            max_depth: 3,
            learning_rate: 0.3,
            ..GbdtConfig::default()
        },
        ..TrainingConfig::default()
    };
    config.llm = LlmConfig {
        enabled: false,
        ..LlmConfig::default()
    };
    config
}

/// Train, publish and activate one version; returns its id
pub async fn train_and_activate(service: &RiskService, seed: i64) -> String {
    let report = service
        .train(loan_dataset(400, seed), None)
        .await
        .expect("training succeeds");
    let version_id = report.version_id.expect("published version id");
    let reload = service
        .activate_version(&version_id)
        .await
        .expect("activation succeeds");
    assert!(reload.success, "{:?}", reload.error);
    version_id
}

pub fn risky_applicant() -> LoanRecord {
    LoanRecord::new()
        .with("person_income", 22000.0)
        .with("loan_amnt", 14000.0)
        .with("loan_int_rate", 21.0)
        .with("loan_grade", "D")
        .with("person_home_ownership", "RENT")
}

pub fn safe_applicant() -> LoanRecord {
    LoanRecord::new()
        .with("person_income", 90000.0)
        .with("loan_amnt", 5000.0)
        .with("loan_int_rate", 7.0)
        .with("loan_grade", "A")
        .with("person_home_ownership", "OWN")
}
