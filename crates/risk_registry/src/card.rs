//! Markdown model card written next to each version's artifacts

use crate::version::ModelVersion;
use credit_risk_core::{FeatureSchema, FieldKind, MetricsSnapshot};
use std::fmt::Write;

/// Render the human-readable card for a published version
pub fn render_model_card(
    version: &ModelVersion,
    schema: &FeatureSchema,
    metrics: &MetricsSnapshot,
) -> String {
    let mut card = String::new();
    // fmt::Write on String cannot fail
    let _ = writeln!(card, "# Loan default model {}", version.version_id);
    let _ = writeln!(card);
    let _ = writeln!(card, "- Published: {}", version.created_at);
    let _ = writeln!(
        card,
        "- Target: {}",
        version.target.as_deref().unwrap_or("(unknown)")
    );
    let _ = writeln!(card, "- Trees: {}", version.num_trees);
    let _ = writeln!(card, "- Encoded features: {}", version.feature_count);
    let _ = writeln!(card, "- Rows dropped for unmapped targets: {}", version.dropped_rows);

    let _ = writeln!(card, "\n## Hold-out metrics\n");
    let _ = writeln!(card, "| Metric | Value |");
    let _ = writeln!(card, "|--------|-------|");
    for (name, value) in [
        ("Accuracy", metrics.accuracy),
        ("Precision", metrics.precision),
        ("Recall", metrics.recall),
        ("F1", metrics.f1),
        ("AUC-ROC", metrics.auc_roc),
    ] {
        let _ = writeln!(card, "| {name} | {value:.4} |");
    }
    let _ = writeln!(
        card,
        "\nTrain rows {}, test rows {}, positive rate {:.3}, decision threshold {}.",
        metrics.train_rows, metrics.test_rows, metrics.positive_rate, metrics.decision_threshold
    );

    if !version.target_mapping.is_empty() {
        let _ = writeln!(card, "\n## Target mapping\n");
        for (raw, label) in &version.target_mapping {
            let _ = writeln!(card, "- `{raw}` -> {label}");
        }
    }

    let _ = writeln!(card, "\n## Input fields\n");
    for field in &schema.fields {
        match &field.kind {
            FieldKind::Numeric(stats) => {
                let _ = writeln!(
                    card,
                    "- `{}` numeric, range {} to {}, median {}",
                    field.name,
                    stats.min,
                    stats.max,
                    stats
                        .median
                        .map_or_else(|| "n/a".to_string(), |m| m.to_string())
                );
            }
            FieldKind::Categorical(stats) => {
                let _ = writeln!(
                    card,
                    "- `{}` categorical, levels {}",
                    field.name,
                    stats.levels.join(", ")
                );
            }
        }
    }
    card
}
