//! End-to-end training runs on a synthetic loan book
//!
//! Defaults follow a fixed rule (high rate or high loan-to-income), so a
//! correct pipeline should learn it almost perfectly.

use anyhow::Result;
use credit_risk_core::{FieldValue, Imputer, LoanRecord, RiskThresholds};
use credit_risk_registry::VersionStore;
use credit_risk_trainer::{
    train_from_csv, CancellationFlag, GbdtConfig, LcgRng, TabularDataset, TrainerError,
    TrainingConfig, TrainingPipeline,
};
use std::io::Write;

const GRADES: [&str; 4] = ["A", "B", "C", "D"];
const HOMES: [&str; 3] = ["RENT", "OWN", "MORTGAGE"];

fn loan_book(rows: usize, seed: i64) -> Vec<LoanRecord> {
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

fn small_config() -> TrainingConfig {
    TrainingConfig {
        gbdt: GbdtConfig {
            num_trees: 30,
            max_depth: 3,
            learning_rate: 0.3,
            ..GbdtConfig::default()
        },
        ..TrainingConfig::default()
    }
}

#[test]
fn test_pipeline_learns_and_publishes() -> Result<()> {
    let dataset = TabularDataset::from_records(&loan_book(400, 7));
    let outcome =
        TrainingPipeline::new(small_config(), 0.5).run(&dataset, None, &CancellationFlag::new())?;
    let report = &outcome.report;

    assert_eq!(report.target, "loan_status");
    assert_eq!(report.rows_after_cleaning, 400);
    assert_eq!(report.dropped_rows, 0);
    assert_eq!(report.train_rows + report.test_rows, 400);
    // row maps iterate by field name, so columns arrive sorted
    assert_eq!(
        report.numeric_features,
        vec!["loan_amnt", "loan_int_rate", "person_income"]
    );
    assert_eq!(
        report.categorical_features,
        vec!["loan_grade", "person_home_ownership"]
    );
    // 3 numeric + 4 grades + 3 home ownership levels
    assert_eq!(report.feature_count, 10);
    assert!(report.metrics.accuracy > 0.85, "{:?}", report.metrics);
    assert!(report.metrics.auc_roc > 0.9, "{:?}", report.metrics);
    assert_eq!(report.metrics.decision_threshold, 0.5);

    let dir = tempfile::tempdir()?;
    let store = VersionStore::open(dir.path())?;
    let version = store.publish(&outcome.to_new_version())?;
    assert_eq!(version.target.as_deref(), Some("loan_status"));
    assert!(store.current()?.is_none());

    let bundle = store.load_bundle(&version.version_id)?;
    let thresholds = RiskThresholds::default();
    let imputer = Imputer::default();
    let good = LoanRecord::new()
        .with("person_income", 90000.0)
        .with("loan_amnt", 5000.0)
        .with("loan_int_rate", 7.0)
        .with("loan_grade", "A")
        .with("person_home_ownership", "OWN");
    let bad = LoanRecord::new()
        .with("person_income", 22000.0)
        .with("loan_amnt", 14000.0)
        .with("loan_int_rate", 21.0)
        .with("loan_grade", "D")
        .with("person_home_ownership", "RENT");
    let p_good = bundle.assess(&good, &imputer, &thresholds)?.result.probability;
    let p_bad = bundle.assess(&bad, &imputer, &thresholds)?.result.probability;
    assert!(p_good < 0.4, "good applicant scored {p_good}");
    assert!(p_bad > 0.6, "bad applicant scored {p_bad}");
    Ok(())
}

#[test]
fn test_training_is_deterministic() -> Result<()> {
    let dataset = TabularDataset::from_records(&loan_book(300, 11));
    let pipeline = TrainingPipeline::new(small_config(), 0.5);
    let a = pipeline.run(&dataset, None, &CancellationFlag::new())?;
    let b = pipeline.run(&dataset, None, &CancellationFlag::new())?;
    assert_eq!(a.model.hash_hex()?, b.model.hash_hex()?);
    assert_eq!(a.schema, b.schema);
    assert_eq!(a.report.metrics, b.report.metrics);
    Ok(())
}

#[test]
fn test_too_few_rows() {
    let dataset = TabularDataset::from_records(&loan_book(60, 3));
    let err = TrainingPipeline::new(small_config(), 0.5)
        .run(&dataset, None, &CancellationFlag::new())
        .unwrap_err();
    assert!(matches!(err, TrainerError::InsufficientData(_)), "{err}");
}

#[test]
fn test_single_class_rejected() {
    let records: Vec<LoanRecord> = loan_book(150, 5)
        .into_iter()
        .map(|r| r.with("loan_status", 0.0))
        .collect();
    let err = TrainingPipeline::new(small_config(), 0.5)
        .run(&TabularDataset::from_records(&records), None, &CancellationFlag::new())
        .unwrap_err();
    assert!(matches!(err, TrainerError::InsufficientData(_)), "{err}");
}

#[test]
fn test_missing_target() {
    let records: Vec<LoanRecord> = loan_book(150, 5)
        .into_iter()
        .map(|r| {
            r.iter()
                .filter(|(name, _)| name.as_str() != "loan_status")
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .collect();
    let err = TrainingPipeline::new(small_config(), 0.5)
        .run(&TabularDataset::from_records(&records), None, &CancellationFlag::new())
        .unwrap_err();
    match err {
        TrainerError::TargetNotFound { candidates } => {
            assert!(candidates.contains(&"loan_status".to_string()))
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_cancelled_run_produces_nothing() {
    let dataset = TabularDataset::from_records(&loan_book(200, 9));
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let err = TrainingPipeline::new(small_config(), 0.5)
        .run(&dataset, None, &cancel)
        .unwrap_err();
    assert!(matches!(err, TrainerError::Cancelled { .. }));
}

#[test]
fn test_text_target_with_hint_and_dropped_rows() -> Result<()> {
    let mut records = loan_book(240, 13);
    for (i, record) in records.iter_mut().enumerate() {
        let status = record.get("loan_status").as_f64().unwrap_or(0.0);
        let label = match (i % 40, status > 0.5) {
            (0, _) => "unknown",
            (_, true) => "Yes",
            (_, false) => "no",
        };
        record.insert("loan_status".to_string(), FieldValue::Absent);
        record.insert("defaulted".to_string(), FieldValue::from(label));
    }

    let dataset = TabularDataset::from_records(&records);
    let outcome = TrainingPipeline::new(small_config(), 0.5).run(
        &dataset,
        Some("defaulted"),
        &CancellationFlag::new(),
    )?;
    assert_eq!(outcome.report.target, "defaulted");
    assert_eq!(outcome.report.dropped_rows, 6);
    assert_eq!(outcome.report.rows_after_cleaning, 234);
    assert_eq!(outcome.report.target_mapping.get("Yes"), Some(&1));
    assert!(!outcome.schema.field_names().any(|f| f == "loan_status"));
    Ok(())
}

#[test]
fn test_train_from_csv_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        "person_income,loan_amnt,loan_int_rate,loan_grade,person_home_ownership,loan_status"
    )?;
    for record in loan_book(200, 21) {
        let cell = |name: &str| record.get(name).to_string();
        writeln!(
            file,
            "{},{},{},{},{},{}",
            cell("person_income"),
            cell("loan_amnt"),
            cell("loan_int_rate"),
            cell("loan_grade"),
            cell("person_home_ownership"),
            cell("loan_status")
        )?;
    }
    file.flush()?;

    let outcome = train_from_csv(file.path(), None, small_config(), 0.5)?;
    assert_eq!(outcome.report.rows_after_cleaning, 200);
    assert_eq!(outcome.model.num_trees(), 30);
    Ok(())
}

#[test]
fn test_report_lists_only_schema_fields() -> Result<()> {
    let mut records = loan_book(400, 7);
    // branch_code only appears on rows whose target cannot be mapped
    for branch in ["north", "south", "east"] {
        records.push(
            LoanRecord::new()
                .with("branch_code", branch)
                .with("loan_status", "unknown"),
        );
    }
    let dataset = TabularDataset::from_records(&records);
    let outcome =
        TrainingPipeline::new(small_config(), 0.5).run(&dataset, None, &CancellationFlag::new())?;
    let report = &outcome.report;

    assert_eq!(report.dropped_rows, 3);
    assert!(outcome.schema.field("branch_code").is_none());
    assert_eq!(
        report.categorical_features,
        vec!["loan_grade", "person_home_ownership"]
    );
    assert_eq!(
        report.numeric_features,
        vec!["loan_amnt", "loan_int_rate", "person_income"]
    );
    assert_eq!(report.feature_count, 10);
    Ok(())
}
