// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synthetic ground-truth generator: labeled Gaussian-mixture samples with an
//! analytically known mutual information.
//!
//! One multivariate normal per class, covariance from a random orthogonal
//! rotation and a random diagonal scale, class means offset by
//! `class_index · 1.5 · distance` along the all-ones direction. Larger
//! `distance` monotonically increases class separability and therefore the
//! true MI, which makes it a controllable difficulty knob for validating
//! estimators: generate data, run an estimator, compare against
//! [`SyntheticGroundTruthGenerator::reference_mi`].

pub mod gaussian;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::LeakError;
use gaussian::{GaussianClassDistribution, random_orthogonal};

/// Mean separation per class index per unit of `distance`.
const MEAN_STEP: f64 = 1.5;

/// Retry cap for the Monte-Carlo log-ratio estimate.
const MC_RETRY_CAP: usize = 100;

/// Samples drawn per class: one count for every class, or explicit
/// per-class counts.
#[derive(Debug, Clone)]
pub enum SamplesPerClass {
    Uniform(usize),
    PerClass(Vec<usize>),
}

/// Reference-MI technique, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMiMethod {
    /// Direct Monte-Carlo average of `log2 P(x|y)/P(x)` over fresh draws.
    MonteCarloLogRatio,
    /// Bayes-predictor entropy decomposition `E[Σ_y p(y|x) log2 p(y|x)] + H(Y)`.
    BayesPredictor,
    /// Plain softmax normalization of the exact posterior.
    Softmax,
    /// Prior-corrected softmax normalization of the exact posterior.
    PcSoftmax,
}

/// A reference MI value plus the diagnostic for the Monte-Carlo fallback.
#[derive(Debug, Clone, Copy)]
pub struct MiEstimate {
    /// Estimated mutual information in bits, floored at 0.
    pub value: f64,
    /// True when the retry cap was exhausted and a negative running estimate
    /// was sign-flipped. The value is then a flagged approximation, not a
    /// guarantee.
    pub fallback_used: bool,
}

/// Generator for labeled samples from parametric class-conditional
/// distributions with a known closed-form posterior.
///
/// The class distributions are built once at construction and never mutated;
/// every [`generate_dataset`](Self::generate_dataset) call is an independent
/// fresh draw.
pub struct SyntheticGroundTruthGenerator {
    n_classes: usize,
    n_features: usize,
    samples_per_class: Vec<usize>,
    distance: f64,
    distributions: Vec<GaussianClassDistribution>,
    rng: StdRng,
}

impl SyntheticGroundTruthGenerator {
    pub fn new(
        n_classes: usize,
        n_features: usize,
        samples_per_class: SamplesPerClass,
        distance: f64,
        base_seed: u64,
        fold_id: u64,
    ) -> Result<Self, LeakError> {
        if n_classes < 2 {
            return Err(LeakError::Config(format!(
                "n_classes must be >= 2, got {n_classes}"
            )));
        }
        if n_features == 0 {
            return Err(LeakError::Config("n_features must be >= 1".into()));
        }
        let samples_per_class = match samples_per_class {
            SamplesPerClass::Uniform(n) => vec![n; n_classes],
            SamplesPerClass::PerClass(counts) => {
                if counts.len() != n_classes {
                    return Err(LeakError::Config(format!(
                        "samples_per_class has {} entries for {n_classes} classes",
                        counts.len()
                    )));
                }
                counts
            }
        };
        if samples_per_class.iter().any(|&n| n == 0) {
            return Err(LeakError::Config(
                "every class needs at least one sample".into(),
            ));
        }
        let n_instances: usize = samples_per_class.iter().sum();

        let mut rng = StdRng::seed_from_u64(base_seed);
        // Covariance seed: fresh draw in [0, 2^31) plus the fold offset. The
        // rotation and scale are drawn once and shared by every class, so
        // `distance` is the sole separability knob: at distance 0 the class
        // conditionals coincide and the true MI is exactly zero.
        let seed = u64::from(rng.gen_range(0..1u32 << 31)) + fold_id;
        let mut cov_rng = StdRng::seed_from_u64(seed);
        let rotation = random_orthogonal(&mut cov_rng, n_features);
        let scales = Array1::from_iter((0..n_features).map(|_| cov_rng.gen_range(0.0..1.0)));

        let mut distributions = Vec::with_capacity(n_classes);
        for (k, &n_k) in samples_per_class.iter().enumerate() {
            let mean = Array1::from_elem(n_features, 1.0 + (k as f64) * MEAN_STEP * distance);
            let prior = n_k as f64 / n_instances as f64;
            distributions.push(GaussianClassDistribution::new(
                mean,
                rotation.clone(),
                scales.clone(),
                prior,
            ));
        }

        Ok(Self {
            n_classes,
            n_features,
            samples_per_class,
            distance,
            distributions,
            rng,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_instances(&self) -> usize {
        self.samples_per_class.iter().sum()
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn class_priors(&self) -> Array1<f64> {
        Array1::from_iter(self.distributions.iter().map(|d| d.prior()))
    }

    pub fn distribution(&self, class: usize) -> &GaussianClassDistribution {
        &self.distributions[class]
    }

    /// Draw a fresh labeled dataset: `samples_per_class[k]` i.i.d. samples
    /// per class, concatenated. Each call is an independent Monte-Carlo
    /// trial; nothing is cached.
    pub fn generate_dataset(&mut self) -> (Array2<f64>, Array1<usize>) {
        let total = self.n_instances();
        let mut x = Array2::<f64>::zeros((total, self.n_features));
        let mut y = Array1::<usize>::zeros(total);
        let mut offset = 0;
        for (k, &n_k) in self.samples_per_class.iter().enumerate() {
            let seed: u64 = self.rng.r#gen();
            let mut draw_rng = StdRng::seed_from_u64(seed);
            let samples = self.distributions[k].sample(&mut draw_rng, n_k);
            x.slice_mut(ndarray::s![offset..offset + n_k, ..]).assign(&samples);
            y.slice_mut(ndarray::s![offset..offset + n_k]).fill(k);
            offset += n_k;
        }
        (x, y)
    }

    /// Marginal density `P(x) = Σ_k P(y=k) P(x|y=k)`.
    pub fn marginal_pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.distributions
            .iter()
            .map(|d| d.prior() * d.pdf(x))
            .sum()
    }

    /// Exact Bayes posterior `P(class|x)`, evaluated in log-space.
    pub fn posterior(&self, x: ArrayView1<'_, f64>, class: usize) -> f64 {
        self.posterior_row(x)[class]
    }

    /// Posterior over all classes for one point; rows sum to one.
    pub fn posterior_row(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let log_joint: Array1<f64> = Array1::from_iter(
            self.distributions
                .iter()
                .map(|d| d.prior().ln() + d.log_pdf(x)),
        );
        let max = log_joint.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut weights = log_joint.mapv(|l| (l - max).exp());
        let sum = weights.sum();
        weights.mapv_inplace(|w| w / sum);
        weights
    }

    /// Posterior matrix for a whole sample set (rows = points).
    pub fn posterior_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            out.row_mut(i).assign(&self.posterior_row(row));
        }
        out
    }

    /// Reference MI by the named technique. All methods floor the value at 0.
    pub fn reference_mi(&mut self, method: ReferenceMiMethod) -> MiEstimate {
        match method {
            ReferenceMiMethod::MonteCarloLogRatio => self.monte_carlo_log_ratio_mi(),
            ReferenceMiMethod::BayesPredictor => self.bayes_predictor_mi(),
            ReferenceMiMethod::Softmax => self.softmax_reference_mi(false),
            ReferenceMiMethod::PcSoftmax => self.softmax_reference_mi(true),
        }
    }

    /// Monte-Carlo average of `log2 P(x|y)/P(x)` over re-sampled draws.
    ///
    /// The per-class running estimate is re-drawn while negative (numerical
    /// noise near MI = 0), up to [`MC_RETRY_CAP`] times; only then is the
    /// sign flipped and the estimate flagged.
    fn monte_carlo_log_ratio_mi(&mut self) -> MiEstimate {
        let mut total = 0.0;
        let mut fallback_used = false;
        for k in 0..self.n_classes {
            let mut class_estimate = -1.0;
            let mut iterations = 0;
            while class_estimate < 0.0 {
                let (x, y) = self.generate_dataset();
                let mut sum = 0.0;
                let mut counted = 0usize;
                for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
                    if label != k {
                        continue;
                    }
                    let cond = self.distributions[k].pdf(row);
                    let marg = self.marginal_pdf(row);
                    let ratio = (cond / marg).log2();
                    if ratio.is_finite() {
                        sum += ratio;
                        counted += 1;
                    }
                }
                class_estimate = if counted > 0 { sum / counted as f64 } else { f64::NAN };
                iterations += 1;
                if iterations >= MC_RETRY_CAP {
                    break;
                }
            }
            if class_estimate < 0.0 {
                log::warn!(
                    "Monte-Carlo MI for class {k} stayed negative after {MC_RETRY_CAP} draws; \
                     sign-flipping the estimate"
                );
                class_estimate = -class_estimate;
                fallback_used = true;
            }
            if class_estimate.is_finite() {
                total += class_estimate * self.distributions[k].prior();
            }
        }
        MiEstimate { value: total.max(0.0), fallback_used }
    }

    /// `MI = E[Σ_y p(y|x) log2 p(y|x)] + H(Y)` with the exact posterior.
    fn bayes_predictor_mi(&mut self) -> MiEstimate {
        let (x, _y) = self.generate_dataset();
        let posterior = self.clamped_posterior_matrix(&x);
        let neg_cond_entropy: f64 = posterior
            .axis_iter(Axis(0))
            .map(|row| row.iter().map(|&p| p * p.log2()).sum::<f64>())
            .sum::<f64>()
            / posterior.nrows() as f64;
        let h_y: f64 = self
            .distributions
            .iter()
            .map(|d| -d.prior() * d.prior().log2())
            .sum();
        MiEstimate { value: (neg_cond_entropy + h_y).max(0.0), fallback_used: false }
    }

    /// Softmax-normalized per-sample log-probability of the true class.
    fn softmax_reference_mi(&mut self, prior_corrected: bool) -> MiEstimate {
        let (x, y) = self.generate_dataset();
        let posterior = self.clamped_posterior_matrix(&x);
        let value = if prior_corrected {
            crate::bounds::pc_softmax_mi(y.view(), posterior.view())
        } else {
            crate::bounds::softmax_mi(y.view(), posterior.view())
        };
        MiEstimate { value: value.max(0.0), fallback_used: false }
    }

    fn clamped_posterior_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut posterior = self.posterior_matrix(x);
        posterior.mapv_inplace(|p| p.clamp(f64::EPSILON, 1.0 - f64::EPSILON));
        posterior
    }
}
