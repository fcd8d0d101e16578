//! Hold-out evaluation metrics

use credit_risk_core::MetricsSnapshot;
use std::cmp::Ordering;

/// Confusion-matrix counts at a fixed threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_scores(labels: &[u8], probabilities: &[f64], threshold: f64) -> Self {
        let mut c = Confusion::default();
        for (&y, &p) in labels.iter().zip(probabilities) {
            match (y == 1, p >= threshold) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Zero when the denominator is zero
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores share their average rank. Returns 0.5 when only one class
/// is present.
pub fn auc_roc(labels: &[u8], probabilities: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[a]
            .partial_cmp(&probabilities[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie group i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        pos_rank_sum += mean_rank * order[i..=j].iter().filter(|&&k| labels[k] == 1).count() as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

/// Assemble the persisted snapshot
pub fn evaluate(
    labels: &[u8],
    probabilities: &[f64],
    threshold: f64,
    train_rows: usize,
    positive_rate: f64,
) -> MetricsSnapshot {
    let confusion = Confusion::from_scores(labels, probabilities, threshold);
    MetricsSnapshot {
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        auc_roc: auc_roc(labels, probabilities),
        train_rows,
        test_rows: labels.len(),
        positive_rate,
        decision_threshold: threshold,
    }
}
