// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multivariate normal class-conditional distributions with eigen-factored
//! covariance.
//!
//! The covariance is never materialized: it is held as `Q · diag(s) · Qᵗ`
//! with `Q` a random orthogonal matrix and `s` non-negative diagonal
//! entries, which guarantees a valid (positive semi-definite) covariance by
//! construction and makes both sampling and density evaluation cheap —
//! sampling is `μ + Q(√s ⊙ z)` for standard-normal `z`, and the log-density
//! needs only `diag(1/s)` in the rotated frame.

use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;

use std::f64::consts::PI;

/// Floor applied to diagonal scales so the factored covariance stays
/// invertible for density evaluation.
const SCALE_FLOOR: f64 = 1e-12;

/// Draw a random orthogonal matrix via modified Gram–Schmidt on a
/// standard-normal matrix, with the diagonal sign fixed positive.
pub fn random_orthogonal(rng: &mut impl Rng, dim: usize) -> Array2<f64> {
    assert!(dim >= 1, "dimension must be >= 1");
    let mut q = Array2::<f64>::zeros((dim, dim));
    for j in 0..dim {
        let mut v: Array1<f64> = Array1::from_iter((0..dim).map(|_| rng.sample(StandardNormal)));
        for i in 0..j {
            let qi = q.column(i);
            let proj: f64 = qi.dot(&v);
            v.iter_mut().zip(qi.iter()).for_each(|(vk, &qk)| *vk -= proj * qk);
        }
        let norm = v.dot(&v).sqrt();
        // A numerically dependent draw is vanishingly rare; redrawing keeps
        // the loop total.
        if norm < 1e-12 {
            return random_orthogonal(rng, dim);
        }
        let sign = if v[j] < 0.0 { -1.0 } else { 1.0 };
        v.mapv_inplace(|x| sign * x / norm);
        q.column_mut(j).assign(&v);
    }
    q
}

/// One class-conditional Gaussian, immutable after construction.
#[derive(Debug, Clone)]
pub struct GaussianClassDistribution {
    mean: Array1<f64>,
    /// Orthogonal rotation of the covariance eigendecomposition.
    rotation: Array2<f64>,
    /// Diagonal scales (eigenvalues), floored away from zero.
    scales: Array1<f64>,
    /// Class prior probability.
    prior: f64,
    log_norm: f64,
}

impl GaussianClassDistribution {
    pub fn new(mean: Array1<f64>, rotation: Array2<f64>, scales: Array1<f64>, prior: f64) -> Self {
        let dim = mean.len();
        assert_eq!(rotation.nrows(), dim);
        assert_eq!(rotation.ncols(), dim);
        assert_eq!(scales.len(), dim);
        assert!((0.0..=1.0).contains(&prior), "prior must be a probability");
        let scales = scales.mapv(|s| s.max(SCALE_FLOOR));
        let log_det: f64 = scales.iter().map(|s| s.ln()).sum();
        let log_norm = -0.5 * (dim as f64 * (2.0 * PI).ln() + log_det);
        Self { mean, rotation, scales, prior, log_norm }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// Dense covariance `Q · diag(s) · Qᵗ`. Only used by diagnostics/tests;
    /// the hot paths stay in factored form.
    pub fn covariance(&self) -> Array2<f64> {
        let scaled = &self.rotation * &self.scales; // column j scaled by s_j
        scaled.dot(&self.rotation.t())
    }

    /// Draw `n` i.i.d. samples as rows.
    pub fn sample(&self, rng: &mut impl Rng, n: usize) -> Array2<f64> {
        let dim = self.dim();
        let sqrt_scales = self.scales.mapv(f64::sqrt);
        let mut out = Array2::<f64>::zeros((n, dim));
        for mut row in out.rows_mut() {
            let z: Array1<f64> =
                Array1::from_iter((0..dim).map(|_| rng.sample::<f64, _>(StandardNormal)));
            let x = &self.mean + &self.rotation.dot(&(&sqrt_scales * &z));
            row.assign(&x);
        }
        out
    }

    /// Log-density at `x`, evaluated in the rotated frame.
    pub fn log_pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        assert_eq!(x.len(), self.dim(), "point dimension mismatch");
        let centered = &x - &self.mean;
        let rotated = self.rotation.t().dot(&centered);
        let mahalanobis: f64 = rotated
            .iter()
            .zip(self.scales.iter())
            .map(|(&r, &s)| r * r / s)
            .sum();
        self.log_norm - 0.5 * mahalanobis
    }

    pub fn pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.log_pdf(x).exp()
    }
}
