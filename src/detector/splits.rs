// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seeded stratified splitting for cross-validation.
//!
//! Each split shuffles indices per class with a rng derived from the base
//! seed plus the fold offset, then deals them round-robin across folds, so
//! every fold preserves the class proportions and identical base seeds
//! reproduce identical splits.

use ndarray::ArrayView1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::LeakError;

/// One train/test partition.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified shuffle-split iterator state.
pub struct StratifiedSplitter {
    n_splits: usize,
    test_fraction: f64,
    base_seed: u64,
}

impl StratifiedSplitter {
    pub fn new(n_splits: usize, test_fraction: f64, base_seed: u64) -> Result<Self, LeakError> {
        if n_splits == 0 {
            return Err(LeakError::Config("n_splits must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(LeakError::Config(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        Ok(Self { n_splits, test_fraction, base_seed })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Produce the `fold_id`-th stratified train/test split of `y`.
    ///
    /// Every class contributes `test_fraction` of its indices (at least one)
    /// to the test side; shuffling is seeded by base seed + fold id.
    pub fn split(&self, y: ArrayView1<'_, usize>, fold_id: usize) -> Result<Split, LeakError> {
        if fold_id >= self.n_splits {
            return Err(LeakError::Config(format!(
                "fold_id {fold_id} out of range for {} splits",
                self.n_splits
            )));
        }
        let n_classes = y.iter().copied().max().map_or(0, |m| m + 1);
        let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in y.iter().enumerate() {
            per_class[label].push(i);
        }
        if per_class.iter().any(|idx| idx.len() < 2) {
            return Err(LeakError::Config(
                "stratified split needs at least two samples per class".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.base_seed + fold_id as u64);
        let mut train = Vec::with_capacity(y.len());
        let mut test = Vec::new();
        for indices in per_class.iter() {
            let mut shuffled = indices.clone();
            shuffled.shuffle(&mut rng);
            let n_test = ((shuffled.len() as f64 * self.test_fraction).round() as usize)
                .clamp(1, shuffled.len() - 1);
            test.extend_from_slice(&shuffled[..n_test]);
            train.extend_from_slice(&shuffled[n_test..]);
        }
        // Keep the training side permuted so a learning-curve truncation
        // (train[..train_size]) still samples every class.
        train.shuffle(&mut rng);
        test.sort_unstable();
        Ok(Split { train, test })
    }
}
