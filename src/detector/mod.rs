// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-validated leakage detection.
//!
//! The detector drives the whole estimation pipeline:
//! hyperparameter search once, then repeated stratified cross-validation
//! splits, a hypothesis ensemble per split, metric accumulation into a
//! [`ResultsTable`](results::ResultsTable), at-most-once persistence keyed
//! by a configuration fingerprint, and finally a statistical test against
//! the majority-voting baseline.
//!
//! States: `Unfitted → HyperparamSearch → CrossValidating →
//! ResultsPersisted → Tested`. When results for the fingerprint already
//! exist on disk, `fit` short-circuits directly to `ResultsPersisted`
//! without refitting anything.

pub mod ensemble;
pub mod metrics;
pub mod results;
pub mod splits;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::bounds;
use crate::context::RunContext;
use crate::error::LeakError;
use crate::learner::{Learner, LearnerFactory, MajorityVoting, ParamSet};
use crate::search::{
    HyperparamSearch, LossDirection, RandomSearch, SearchOutcome, SearchSpace,
};
use crate::stats::{self, DetectionPolicy, TestResult};

use ensemble::{CalibrationSpec, HypothesisEnsembleFitter};
use metrics::MetricKind;
use results::{ConfigurationFingerprint, ResultsTable};
use splits::StratifiedSplitter;

/// Detector lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Unfitted,
    HyperparamSearch,
    CrossValidating,
    ResultsPersisted,
    Tested,
}

/// Static configuration of one detector run.
pub struct DetectorConfig {
    /// Dataset identity, part of the configuration fingerprint.
    pub dataset_id: String,
    pub n_classes: usize,
    pub n_features: usize,
    /// Number of stratified cross-validation splits.
    pub cv_iterations: usize,
    /// Held-out fraction per split.
    pub test_fraction: f64,
    /// Independently initialized learner instances per split.
    pub n_hypothesis: usize,
    /// Metrics accumulated per hypothesis per split.
    pub metrics: Vec<MetricKind>,
    /// Fixed learner hyperparameters; searched ones are merged on top.
    pub learner_params: ParamSet,
    /// Declared hyperparameter space; empty skips the search stage.
    pub search_space: SearchSpace,
    pub search_iterations: usize,
    /// Wall-clock budget for the search stage.
    pub search_budget: Option<std::time::Duration>,
    /// Metric scored by the search on its internal validation split.
    pub validation_metric: MetricKind,
    /// Whether the search minimizes or maximizes the validation metric.
    pub validation_direction: LossDirection,
}

impl DetectorConfig {
    pub fn new(dataset_id: impl Into<String>, n_classes: usize, n_features: usize) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            n_classes,
            n_features,
            cv_iterations: 5,
            test_fraction: 0.3,
            n_hypothesis: 5,
            metrics: MetricKind::standard_set(),
            learner_params: ParamSet::new(),
            search_space: SearchSpace::default(),
            search_iterations: 0,
            search_budget: None,
            validation_metric: MetricKind::Accuracy,
            validation_direction: LossDirection::Maximize,
        }
    }

    fn validate(&self) -> Result<(), LeakError> {
        if self.n_classes < 2 {
            return Err(LeakError::Config("n_classes must be >= 2".into()));
        }
        if self.cv_iterations == 0 {
            return Err(LeakError::Config("cv_iterations must be >= 1".into()));
        }
        if self.n_hypothesis == 0 {
            return Err(LeakError::Config("n_hypothesis must be >= 1".into()));
        }
        if self.metrics.is_empty() {
            return Err(LeakError::Config("at least one metric must be configured".into()));
        }
        Ok(())
    }
}

/// Structured leakage verdict.
#[derive(Debug, Clone)]
pub struct LeakageVerdict {
    /// True iff the p-value beat the threshold AND the tested statistic
    /// exceeds the majority-voting chance reference.
    pub significant: bool,
    pub policy: DetectionPolicy,
    pub metric: MetricKind,
    pub p_value: f64,
    pub statistic: f64,
    /// Mean of the tested metric across splits and usable hypotheses.
    pub model_mean: f64,
    /// Mean of the majority-voting baseline for the same metric.
    pub baseline_mean: f64,
    /// Fano lower bound on MI implied by the observed mean accuracy.
    pub implied_mi_lower_bound: f64,
    /// Hypotheses that survived fitting; failures are excluded from the
    /// test, never silently folded into a "no leakage" answer.
    pub usable_hypotheses: usize,
    pub total_hypotheses: usize,
}

/// Cross-validated, multi-hypothesis leakage detector.
pub struct CrossValidatedLeakageDetector<'a> {
    context: RunContext,
    config: DetectorConfig,
    factory: &'a dyn LearnerFactory,
    calibration: Option<CalibrationSpec>,
    state: DetectorState,
    fingerprint: ConfigurationFingerprint,
    search_outcome: Option<SearchOutcome>,
    results: Option<ResultsTable>,
}

impl<'a> CrossValidatedLeakageDetector<'a> {
    pub fn new(
        context: RunContext,
        config: DetectorConfig,
        factory: &'a dyn LearnerFactory,
    ) -> Result<Self, LeakError> {
        config.validate()?;
        let fingerprint = ConfigurationFingerprint::new(
            factory.name(),
            &config.learner_params,
            &config.dataset_id,
            config.cv_iterations as u64,
            context.base_seed(),
        );
        Ok(Self {
            context,
            config,
            factory,
            calibration: None,
            state: DetectorState::Unfitted,
            fingerprint,
            search_outcome: None,
            results: None,
        })
    }

    /// Configure an optional calibration stage between `predict_proba` and
    /// metric computation.
    pub fn with_calibration(mut self, spec: CalibrationSpec) -> Self {
        self.calibration = Some(spec);
        self
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn fingerprint(&self) -> &ConfigurationFingerprint {
        &self.fingerprint
    }

    pub fn results(&self) -> Option<&ResultsTable> {
        self.results.as_ref()
    }

    pub fn search_outcome(&self) -> Option<&SearchOutcome> {
        self.search_outcome.as_ref()
    }

    /// Run the full pipeline, or load persisted results for an identical
    /// configuration (at-most-once computation).
    pub fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError> {
        self.check_inputs(x, y)?;

        let path = self.fingerprint.results_path(self.context.output_dir());
        match ResultsTable::load(&path) {
            Ok(table) => {
                log::info!(
                    "results for fingerprint {} already persisted; skipping fit",
                    self.fingerprint.as_str()
                );
                self.results = Some(table);
                self.state = DetectorState::ResultsPersisted;
                return Ok(());
            }
            Err(err) if err.is_cache_miss() => {
                log::info!("no usable persisted results ({err}); computing");
            }
            Err(err) => {
                log::warn!("results file unreadable ({err}); recomputing");
            }
        }

        self.state = DetectorState::HyperparamSearch;
        let search = self.perform_hyperparameter_search(x, y)?;
        let effective_params = self.effective_params(&search);
        let train_size = search.as_ref().and_then(|s| s.train_size);
        self.search_outcome = search;

        self.state = DetectorState::CrossValidating;
        let mut table =
            ResultsTable::with_hypotheses(self.config.n_hypothesis, &self.metric_names());
        let splitter = StratifiedSplitter::new(
            self.config.cv_iterations,
            self.config.test_fraction,
            self.context.base_seed(),
        )?;
        for k in 0..self.config.cv_iterations {
            log::info!("cross-validation split {k}");
            let mut split = splitter.split(y, k)?;
            if let Some(limit) = train_size {
                split.train.truncate(limit);
            }
            let (x_train, y_train) = take_rows(x, y, &split.train);
            let (x_test, y_test) = take_rows(x, y, &split.test);
            table.n_test.push(split.test.len());

            self.score_baseline(
                &mut table,
                x_train.view(),
                y_train.view(),
                x_test.view(),
                y_test.view(),
            )?;

            let fitter = HypothesisEnsembleFitter::new(
                self.factory,
                &effective_params,
                &self.config.metrics,
                self.calibration.as_ref(),
                self.config.n_hypothesis,
                self.context.n_jobs(),
            );
            let seed_base =
                self.context.base_seed() + (k * self.config.n_hypothesis) as u64;
            let partial = fitter.fit_split(
                x_train.view(),
                y_train.view(),
                x_test.view(),
                y_test.view(),
                seed_base,
            );
            table.merge(partial);
        }

        table.store(&path)?;
        log::info!("results persisted to {}", path.display());
        self.results = Some(table);
        self.state = DetectorState::ResultsPersisted;
        Ok(())
    }

    /// Statistical leakage verdict against the majority-voting baseline.
    pub fn detect(
        &mut self,
        policy: DetectionPolicy,
        threshold: f64,
    ) -> Result<LeakageVerdict, LeakError> {
        let table = self
            .results
            .as_ref()
            .ok_or_else(|| LeakError::Config("detect() called before fit()".into()))?;
        if table.usable_count() == 0 {
            return Err(LeakError::Fit(
                "no usable hypotheses survived fitting; refusing to emit a verdict".into(),
            ));
        }
        let metric = MetricKind::Accuracy;
        let model_values = table.mean_metric_per_split(metric.name());
        let baseline_values = table
            .baseline
            .get(metric.name())
            .cloned()
            .ok_or_else(|| LeakError::Config("baseline accuracy missing from results".into()))?;
        let n_test = table.n_test.iter().copied().max().unwrap_or(0);

        let TestResult { statistic, p_value } =
            stats::run_policy(policy, &model_values, &baseline_values, n_test)?;
        let model_mean = stats::mean(&model_values);
        let baseline_mean = stats::mean(&baseline_values);
        let implied_mi_lower_bound =
            bounds::fanos_lower_bound(model_mean, self.config.n_classes).max(0.0);
        let chance_bound =
            bounds::fanos_lower_bound(baseline_mean, self.config.n_classes).max(0.0);
        let significant =
            p_value < threshold && model_mean > baseline_mean && implied_mi_lower_bound >= chance_bound;

        self.state = DetectorState::Tested;
        Ok(LeakageVerdict {
            significant,
            policy,
            metric,
            p_value,
            statistic,
            model_mean,
            baseline_mean,
            implied_mi_lower_bound,
            usable_hypotheses: table.usable_count(),
            total_hypotheses: table.total_hypotheses(),
        })
    }

    fn check_inputs(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError> {
        if x.nrows() != y.len() {
            return Err(LeakError::Config(format!(
                "{} feature rows vs {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() != self.config.n_features {
            return Err(LeakError::Config(format!(
                "input has {} feature columns, configuration declares {}",
                x.ncols(),
                self.config.n_features
            )));
        }
        if let Some(&max) = y.iter().max() {
            if max >= self.config.n_classes {
                return Err(LeakError::Config(format!(
                    "label {max} out of range for {} classes",
                    self.config.n_classes
                )));
            }
        }
        Ok(())
    }

    fn metric_names(&self) -> Vec<String> {
        self.config.metrics.iter().map(|m| m.name().to_string()).collect()
    }

    /// Merge fixed learner parameters with the searched winners.
    fn effective_params(&self, search: &Option<SearchOutcome>) -> ParamSet {
        let mut params = self.config.learner_params.clone();
        if let Some(outcome) = search {
            for (key, value) in &outcome.best_params {
                params.insert(key.clone(), value.clone());
            }
        }
        params
    }

    fn perform_hyperparameter_search(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
    ) -> Result<Option<SearchOutcome>, LeakError> {
        if self.config.search_space.is_empty() || self.config.search_iterations == 0 {
            return Ok(None);
        }
        // Baseline internal train/validation split, separate from the
        // cross-validation seeds.
        let splitter = StratifiedSplitter::new(
            1,
            self.config.test_fraction,
            self.context.base_seed().wrapping_add(0x5ea7c4),
        )?;
        let split = splitter.split(y, 0)?;
        let (x_train, y_train) = take_rows(x, y, &split.train);
        let (x_val, y_val) = take_rows(x, y, &split.test);

        let mut search = HyperparamSearch::new(
            self.config.search_space.clone(),
            self.config.search_iterations,
            self.config.validation_direction,
        );
        if let Some(budget) = self.config.search_budget {
            search = search.with_budget(budget);
        }
        let mut strategy = RandomSearch::new(self.context.derived_rng(1));
        let validation_metric = self.config.validation_metric;
        let factory = self.factory;
        let fixed = self.config.learner_params.clone();
        let seed = self.context.base_seed();
        let outcome = search.run(&mut strategy, |trial| {
            let mut params = fixed.clone();
            for (key, value) in trial {
                params.insert(key.clone(), value.clone());
            }
            let mut learner = factory.build(&params, seed)?;
            learner.fit(x_train.view(), y_train.view())?;
            let y_pred = learner.predict(x_val.view())?;
            let proba = learner.predict_proba(x_val.view())?;
            Ok(validation_metric.evaluate(
                y_val.view(),
                y_pred.view(),
                proba.view(),
                learner.as_ref(),
                x_val.view(),
            ))
        })?;
        log::info!(
            "hyperparameter search finished: best {} = {:.4}",
            validation_metric.name(),
            outcome.best_score
        );
        Ok(Some(outcome))
    }

    /// Majority-voting reference row for one split.
    fn score_baseline(
        &self,
        table: &mut ResultsTable,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, usize>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError> {
        let mut baseline = MajorityVoting::new(self.config.n_features, self.config.n_classes);
        baseline.fit(x_train, y_train)?;
        let y_pred = baseline.predict(x_test)?;
        let proba = baseline.predict_proba(x_test)?;
        for metric in &self.config.metrics {
            let value =
                metric.evaluate(y_test, y_pred.view(), proba.view(), &baseline, x_test);
            table.append_baseline(metric.name(), value);
        }
        Ok(())
    }
}

/// Materialize the rows selected by `indices`.
fn take_rows(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, usize>,
    indices: &[usize],
) -> (Array2<f64>, ndarray::Array1<usize>) {
    let x_sel = x.select(Axis(0), indices);
    let y_sel = ndarray::Array1::from_iter(indices.iter().map(|&i| y[i]));
    (x_sel, y_sel)
}
