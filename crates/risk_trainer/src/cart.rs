//! CART (Classification and Regression Tree) builder
//!
//! Builds one boosting round's regression tree over gradient/hessian
//! statistics. Feature values are pre-binned against a fixed set of
//! candidate thresholds, so split search is a histogram scan.

use credit_risk_core::{Node, Tree};
use std::collections::BTreeSet;

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian mass per child
    pub min_child_weight: f64,
    /// L2 regularisation on leaf values
    pub lambda: f64,
    /// Minimum gain for a split to be kept
    pub min_split_gain: f64,
    /// Shrinkage applied to every node value
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 5,
            min_child_weight: 1e-3,
            lambda: 1.0,
            min_split_gain: 0.0,
            learning_rate: 0.1,
        }
    }
}

/// Candidate split thresholds per feature
#[derive(Clone, Debug)]
pub struct FeatureBins {
    thresholds: Vec<Vec<f64>>,
}

impl FeatureBins {
    /// Derive thresholds from the training matrix.
    ///
    /// Each threshold is the midpoint between two adjacent distinct values;
    /// features with more than `max_bins` distinct values use evenly spaced
    /// ranks of the sorted distinct values.
    pub fn fit(features: &[Vec<f64>], feature_count: usize, max_bins: usize) -> Self {
        let max_bins = max_bins.max(2);
        let thresholds = (0..feature_count)
            .map(|f| {
                let mut distinct: Vec<f64> = features.iter().map(|row| row[f]).collect();
                distinct.sort_by(f64::total_cmp);
                distinct.dedup();

                let cut_ranks: BTreeSet<usize> = if distinct.len() <= max_bins {
                    (1..distinct.len()).collect()
                } else {
                    (1..max_bins)
                        .map(|k| k * distinct.len() / max_bins)
                        .filter(|&r| r >= 1)
                        .collect()
                };
                cut_ranks
                    .into_iter()
                    .map(|r| (distinct[r - 1] + distinct[r]) / 2.0)
                    .collect()
            })
            .collect();
        Self { thresholds }
    }

    pub fn feature_count(&self) -> usize {
        self.thresholds.len()
    }

    pub fn thresholds(&self, feature_idx: usize) -> &[f64] {
        &self.thresholds[feature_idx]
    }

    /// Bin of a value: number of thresholds strictly below it.
    /// `x <= thresholds[i]` exactly when `bin(x) <= i`.
    pub fn bin(&self, feature_idx: usize, value: f64) -> usize {
        self.thresholds[feature_idx].partition_point(|&t| t < value)
    }

    /// Bin every cell of a row-major matrix
    pub fn bin_matrix(&self, features: &[Vec<f64>]) -> Vec<Vec<usize>> {
        features
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(f, &v)| self.bin(f, v))
                    .collect()
            })
            .collect()
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    bin: usize,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

#[derive(Clone, Copy, Default)]
struct BinStats {
    gradient: f64,
    hessian: f64,
    count: usize,
}

/// Build a regression tree from binned features and boosting statistics
pub struct CartBuilder<'a> {
    config: &'a TreeConfig,
    bins: &'a FeatureBins,
    binned: &'a [Vec<usize>],
    gradients: &'a [f64],
    hessians: &'a [f64],
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        config: &'a TreeConfig,
        bins: &'a FeatureBins,
        binned: &'a [Vec<usize>],
        gradients: &'a [f64],
        hessians: &'a [f64],
    ) -> Self {
        Self {
            config,
            bins,
            binned,
            gradients,
            hessians,
        }
    }

    /// Build a tree over the given rows
    pub fn build(&self, rows: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree::new(nodes)
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.gradients[r], h + self.hessians[r])
        })
    }

    /// Shrunken Newton step -G / (H + lambda)
    fn node_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.config.lambda) * self.config.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    /// Recursively build tree nodes; returns the index of the new node
    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current_idx = nodes.len();
        let (g, h) = self.sums(rows);
        let value = self.node_value(g, h);
        nodes.push(Node::leaf(current_idx as i32, value, h));

        if depth >= self.config.max_depth || rows.len() < 2 * self.config.min_samples_leaf {
            return current_idx as i32;
        }

        let Some(split) = self.find_best_split(rows, g, h, current_idx) else {
            return current_idx as i32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.binned[r][split.feature_idx] <= split.bin);

        let left = self.build_node(&left_rows, depth + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, nodes);

        nodes[current_idx] = Node::internal(
            current_idx as i32,
            split.feature_idx as i32,
            self.bins.thresholds(split.feature_idx)[split.bin],
            left,
            right,
            value,
            h,
        );

        current_idx as i32
    }

    /// Scan per-feature histograms for the best split
    fn find_best_split(
        &self,
        rows: &[usize],
        g_total: f64,
        h_total: f64,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let parent_score = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in 0..self.bins.feature_count() {
            let n_thresholds = self.bins.thresholds(feature_idx).len();
            if n_thresholds == 0 {
                continue;
            }

            let mut histogram = vec![BinStats::default(); n_thresholds + 1];
            for &r in rows {
                let slot = &mut histogram[self.binned[r][feature_idx]];
                slot.gradient += self.gradients[r];
                slot.hessian += self.hessians[r];
                slot.count += 1;
            }

            let mut left = BinStats::default();
            for (bin, stats) in histogram.iter().take(n_thresholds).enumerate() {
                left.gradient += stats.gradient;
                left.hessian += stats.hessian;
                left.count += stats.count;

                let right_count = rows.len() - left.count;
                let right_g = g_total - left.gradient;
                let right_h = h_total - left.hessian;
                if left.count < self.config.min_samples_leaf
                    || right_count < self.config.min_samples_leaf
                    || left.hessian < self.config.min_child_weight
                    || right_h < self.config.min_child_weight
                {
                    continue;
                }

                let gain = self.score(left.gradient, left.hessian) + self.score(right_g, right_h)
                    - parent_score;
                if gain <= self.config.min_split_gain {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    bin,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, bin, node_id),
                };

                best = match best {
                    None => Some(candidate),
                    Some(current) => {
                        // Deterministic tie-breaking
                        if gain > current.gain
                            || (gain == current.gain && candidate.tie_breaker < current.tie_breaker)
                        {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
        }

        best
    }
}
