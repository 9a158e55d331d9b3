// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learner capability consumed by the leakage detector.
//!
//! The engine never looks inside a learning algorithm: it fits through
//! [`Learner`], scores through `predict`/`predict_proba`, and optionally asks
//! MI-estimator-style learners for a direct estimate. Concrete algorithms
//! (trees, SVMs, neural nets, AutoML backends) live outside the core; the
//! two learners implemented here are the deterministic references the
//! detector and its tests rely on.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::LeakError;
use crate::synthetic::SyntheticGroundTruthGenerator;

pub use crate::search::ParamSet;

/// Capability interface for a classification learner.
///
/// `x` is a 2-D real matrix whose column count must match the learner's
/// declared `n_features`; a mismatch is a [`LeakError::Config`] raised at the
/// boundary, before any fitting work.
pub trait Learner: Send {
    /// Declared feature count, checked against every input matrix.
    fn n_features(&self) -> usize;

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, usize>) -> Result<(), LeakError>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<usize>, LeakError>;

    /// Per-class probabilities, rows summing to one.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError>;

    /// Direct MI estimate for MI-estimator-style learners; `None` otherwise.
    fn estimate_mi(
        &self,
        _x: ArrayView2<'_, f64>,
        _y: ArrayView1<'_, usize>,
    ) -> Option<Result<f64, LeakError>> {
        None
    }

    /// Read-only ranking of internal sub-models for AutoML-style learners.
    ///
    /// Empty for learners without internal model selection. Callers rank
    /// and load sub-models through this value object instead of reaching
    /// into the learner's internals.
    fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        Vec::new()
    }
}

/// One ranked sub-model in a learner's internal selection.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub model: String,
    pub validation_score: f64,
}

/// Builds one unfitted learner instance per (hypothesis, seed).
///
/// The ensemble fitter calls this once per hypothesis so that K instances
/// are independently initialized on the same training fold.
pub trait LearnerFactory: Sync {
    fn build(&self, params: &ParamSet, seed: u64) -> Result<Box<dyn Learner>, LeakError>;

    /// Registry name used in configuration fingerprints.
    fn name(&self) -> &str;
}

/// Boundary check shared by every learner implementation.
pub fn check_feature_count(expected: usize, x: ArrayView2<'_, f64>) -> Result<(), LeakError> {
    if x.ncols() != expected {
        return Err(LeakError::Config(format!(
            "input has {} feature columns, learner declares {expected}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Majority-voting baseline: predicts the modal training label.
///
/// Its held-out accuracy estimates the largest class prior, which is the
/// chance level every leakage verdict is measured against.
pub struct MajorityVoting {
    n_features: usize,
    n_classes: usize,
    majority: Option<usize>,
    frequencies: Option<Array1<f64>>,
}

impl MajorityVoting {
    pub fn new(n_features: usize, n_classes: usize) -> Self {
        Self { n_features, n_classes, majority: None, frequencies: None }
    }

    fn fitted(&self) -> Result<usize, LeakError> {
        self.majority
            .ok_or_else(|| LeakError::Fit("majority voting predictor is unfitted".into()))
    }
}

impl Learner for MajorityVoting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, usize>) -> Result<(), LeakError> {
        check_feature_count(self.n_features, x)?;
        if y.is_empty() {
            return Err(LeakError::Fit("cannot fit on an empty training fold".into()));
        }
        let freqs = crate::bounds::class_priors(y, self.n_classes);
        let majority = freqs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(k, _)| k)
            .unwrap_or(0);
        self.majority = Some(majority);
        self.frequencies = Some(freqs);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<usize>, LeakError> {
        check_feature_count(self.n_features, x)?;
        let majority = self.fitted()?;
        Ok(Array1::from_elem(x.nrows(), majority))
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError> {
        check_feature_count(self.n_features, x)?;
        self.fitted()?;
        let freqs = self.frequencies.as_ref().unwrap();
        let mut out = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for mut row in out.rows_mut() {
            row.assign(freqs);
        }
        Ok(out)
    }
}

/// Exact Bayes predictor over a synthetic generator's known mixture.
///
/// Upper-bounds what any learned model can achieve on the same data, which
/// makes it the positive control in validation runs.
pub struct BayesPredictor {
    generator: SyntheticGroundTruthGenerator,
}

impl BayesPredictor {
    pub fn new(generator: SyntheticGroundTruthGenerator) -> Self {
        Self { generator }
    }
}

impl Learner for BayesPredictor {
    fn n_features(&self) -> usize {
        self.generator.n_features()
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, _y: ArrayView1<'_, usize>) -> Result<(), LeakError> {
        // The posteriors are closed-form; fitting only validates the input.
        check_feature_count(self.n_features(), x)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<usize>, LeakError> {
        check_feature_count(self.n_features(), x)?;
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                    .map(|(k, _)| k)
                    .unwrap_or(0)
            })
            .collect())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError> {
        check_feature_count(self.n_features(), x)?;
        Ok(self.generator.posterior_matrix(&x.to_owned()))
    }
}
