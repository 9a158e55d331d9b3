// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hypothesis-ensemble fitting: K independently initialized learner
//! instances on one training fold.
//!
//! Fitting the same learner K times with different random initialization
//! yields a distribution of metric values per split, so the detector can
//! estimate the variance of the leakage signal across re-training, not just
//! across data splits. Hypothesis fits are mutually independent and run on
//! scoped worker threads bounded by the run's `n_jobs`; each worker returns
//! its own partial result and the merge is sequential (collect-then-merge,
//! no shared mutable state). One failed fit is recorded on its hypothesis
//! and never aborts the others.

use ndarray::{ArrayView1, ArrayView2};

use crate::calibration::{CalibrationMethod, Calibrator};
use crate::error::LeakError;
use crate::learner::{LearnerFactory, ParamSet};

use super::metrics::MetricKind;
use super::results::{ResultsTable, hypothesis_id};

/// Builds a fresh calibrator per hypothesis when calibration is configured.
pub struct CalibrationSpec {
    pub method: CalibrationMethod,
    pub build: Box<dyn Fn() -> Box<dyn Calibrator> + Send + Sync>,
}

/// Outcome of fitting and scoring one hypothesis on one split.
struct HypothesisOutcome {
    index: usize,
    metrics: Vec<(String, f64)>,
    error: Option<LeakError>,
}

pub struct HypothesisEnsembleFitter<'a> {
    factory: &'a dyn LearnerFactory,
    params: &'a ParamSet,
    metrics: &'a [MetricKind],
    calibration: Option<&'a CalibrationSpec>,
    n_hypothesis: usize,
    n_jobs: usize,
}

impl<'a> HypothesisEnsembleFitter<'a> {
    pub fn new(
        factory: &'a dyn LearnerFactory,
        params: &'a ParamSet,
        metrics: &'a [MetricKind],
        calibration: Option<&'a CalibrationSpec>,
        n_hypothesis: usize,
        n_jobs: usize,
    ) -> Self {
        Self { factory, params, metrics, calibration, n_hypothesis, n_jobs }
    }

    /// Fit all hypotheses on the training fold and score them on the
    /// held-out fold. Returns a partial [`ResultsTable`] for this split.
    ///
    /// `seed_base` seeds hypothesis `i` with `seed_base + i`, keeping every
    /// initialization reproducible and distinct.
    pub fn fit_split(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, usize>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, usize>,
        seed_base: u64,
    ) -> ResultsTable {
        let n_workers = self.n_jobs.min(self.n_hypothesis).max(1);
        let mut outcomes: Vec<HypothesisOutcome> = Vec::with_capacity(self.n_hypothesis);

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(n_workers);
            for worker in 0..n_workers {
                let handle = scope.spawn(move || {
                    let mut local = Vec::new();
                    let mut index = worker;
                    while index < self.n_hypothesis {
                        local.push(self.run_hypothesis(
                            index,
                            x_train,
                            y_train,
                            x_test,
                            y_test,
                            seed_base + index as u64,
                        ));
                        index += n_workers;
                    }
                    local
                });
                handles.push(handle);
            }
            for handle in handles {
                // A panicked worker loses only its own hypotheses.
                match handle.join() {
                    Ok(local) => outcomes.extend(local),
                    Err(_) => log::error!("ensemble worker panicked; its hypotheses are lost"),
                }
            }
        });

        outcomes.sort_by_key(|o| o.index);
        let mut partial = ResultsTable::default();
        for outcome in outcomes {
            let id = hypothesis_id(outcome.index);
            match outcome.error {
                Some(error) => {
                    log::error!("hypothesis {id} failed: {error}");
                    partial.record_failure(&id, &error);
                }
                None => {
                    for (metric, value) in outcome.metrics {
                        partial.append(&id, &metric, value);
                    }
                }
            }
        }
        partial
    }

    fn run_hypothesis(
        &self,
        index: usize,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, usize>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, usize>,
        seed: u64,
    ) -> HypothesisOutcome {
        match self.fit_and_score(x_train, y_train, x_test, y_test, seed) {
            Ok(metrics) => HypothesisOutcome { index, metrics, error: None },
            Err(error) => HypothesisOutcome { index, metrics: Vec::new(), error: Some(error) },
        }
    }

    fn fit_and_score(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, usize>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, usize>,
        seed: u64,
    ) -> Result<Vec<(String, f64)>, LeakError> {
        let mut learner = self.factory.build(self.params, seed)?;
        learner.fit(x_train, y_train)?;
        let y_pred = learner.predict(x_test)?;
        let mut proba = learner.predict_proba(x_test)?;

        if let Some(spec) = self.calibration {
            let mut adapter =
                crate::calibration::CalibrationAdapter::new(spec.method, (spec.build)());
            let train_proba = learner.predict_proba(x_train)?;
            adapter.fit(train_proba.view(), y_train)?;
            proba = adapter.transform(proba.view())?;
        }

        let mut values = Vec::with_capacity(self.metrics.len());
        for metric in self.metrics {
            let value = metric.evaluate(y_test, y_pred.view(), proba.view(), learner.as_ref(), x_test);
            values.push((metric.name().to_string(), value));
        }
        Ok(values)
    }
}
