//! Deterministic utilities for reproducible training
//!
//! Provides an LCG-based RNG, a seeded stratified split and split
//! tie-breaking so the same data and seed always give the same model.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    // LCG constants (compatible with glibc)
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.wrapping_abs() % Self::MODULUS),
        }
    }

    /// Generate next random i64 in range [0, MODULUS)
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }
}

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows so each class keeps its share in both halves.
///
/// Every class with at least two rows contributes at least one row to
/// each side. Both index lists come back sorted.
pub fn stratified_split(labels: &[u8], test_ratio: f64, seed: i64) -> SplitIndices {
    let mut rng = LcgRng::new(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut rows: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(idx, _)| idx)
            .collect();
        rng.shuffle(&mut rows);

        let mut n_test = (rows.len() as f64 * test_ratio).round() as usize;
        if rows.len() >= 2 {
            n_test = n_test.clamp(1, rows.len() - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    SplitIndices { train, test }
}

/// Deterministic tie-breaker for split selection
/// Returns consistent ordering based on (feature_idx, bin, node_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub bin: usize,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, bin: usize, node_id: usize) -> Self {
        Self {
            feature_idx,
            bin,
            node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..100 {
            assert!(rng.next_range(10) < 10);
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut items: Vec<usize> = (0..50).collect();
        LcgRng::new(7).shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn test_stratified_split_keeps_class_shares() {
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i % 5 == 0)).collect();
        let split = stratified_split(&labels, 0.2, 42);

        assert_eq!(split.train.len() + split.test.len(), 100);
        assert_eq!(split.test.len(), 20);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 4);
        assert_eq!(split, stratified_split(&labels, 0.2, 42));
    }

    #[test]
    fn test_small_class_on_both_sides() {
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        let split = stratified_split(&labels, 0.2, 1);
        assert!(split.test.iter().any(|&i| labels[i] == 1));
        assert!(split.train.iter().any(|&i| labels[i] == 1));
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 3, 0);
        let t2 = SplitTieBreaker::new(0, 3, 1);
        let t3 = SplitTieBreaker::new(1, 0, 0);

        assert!(t1 < t2);
        assert!(t1 < t3);
    }

    proptest! {
        #[test]
        fn prop_split_partitions_rows(
            labels in proptest::collection::vec(0u8..2, 0..200),
            ratio in 0.05f64..0.5,
            seed in any::<i64>(),
        ) {
            let split = stratified_split(&labels, ratio, seed);

            let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());

            for class in [0u8, 1u8] {
                let count = labels.iter().filter(|&&l| l == class).count();
                if count >= 2 {
                    prop_assert!(split.test.iter().any(|&i| labels[i] == class));
                    prop_assert!(split.train.iter().any(|&i| labels[i] == class));
                }
            }
        }
    }
}
