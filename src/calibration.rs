// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probability-calibration adapter.
//!
//! Calibrators themselves are external collaborators; the engine consumes
//! them through the [`Calibrator`] capability and routes configuration per
//! method through a closed registry. When configured, calibration runs after
//! `predict_proba` and before metric computation.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::bounds::normalize_rows;
use crate::error::LeakError;

/// Capability interface for a post-hoc probability calibrator.
pub trait Calibrator: Send {
    fn fit(
        &mut self,
        probabilities: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError>;

    fn transform(&self, probabilities: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError>;
}

/// Closed registry of supported calibration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationMethod {
    IsotonicRegression,
    PlattScaling,
    HistogramBinning,
    BetaCalibration,
    TemperatureScaling,
}

impl CalibrationMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::IsotonicRegression => "isotonic_regression",
            Self::PlattScaling => "platt_scaling",
            Self::HistogramBinning => "histogram_binning",
            Self::BetaCalibration => "beta_calibration",
            Self::TemperatureScaling => "temperature_scaling",
        }
    }

    /// Per-method flags record handed to the external implementation.
    pub fn default_config(self) -> CalibratorConfig {
        match self {
            Self::PlattScaling => CalibratorConfig {
                detection: false,
                independent_probabilities: false,
                temperature_only: false,
                method: Some("mle"),
            },
            _ => CalibratorConfig {
                detection: false,
                independent_probabilities: false,
                temperature_only: false,
                method: None,
            },
        }
    }
}

/// Flags record per calibrator choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratorConfig {
    pub detection: bool,
    pub independent_probabilities: bool,
    pub temperature_only: bool,
    pub method: Option<&'static str>,
}

/// Stateless routing around an externally supplied calibrator.
pub struct CalibrationAdapter {
    method: CalibrationMethod,
    config: CalibratorConfig,
    calibrator: Box<dyn Calibrator>,
}

impl CalibrationAdapter {
    pub fn new(method: CalibrationMethod, calibrator: Box<dyn Calibrator>) -> Self {
        Self { method, config: method.default_config(), calibrator }
    }

    pub fn method(&self) -> CalibrationMethod {
        self.method
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    pub fn fit(
        &mut self,
        probabilities: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError> {
        self.calibrator.fit(probabilities, labels)
    }

    /// Transform probabilities, repairing calibration artifacts.
    ///
    /// Negative or non-finite calibrated entries are clamped and every row
    /// renormalized to sum to one; the repair is logged, never an error.
    pub fn transform(&self, probabilities: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError> {
        let calibrated = self.calibrator.transform(probabilities)?;
        let degenerate = calibrated
            .iter()
            .any(|&p| !p.is_finite() || p < 0.0)
            || calibrated
                .rows()
                .into_iter()
                .any(|row| (row.sum() - 1.0).abs() > 1e-6);
        if degenerate {
            log::warn!(
                "{} produced degenerate probabilities; clamping and renormalizing rows",
                self.method.name()
            );
            return Ok(normalize_rows(calibrated.view()));
        }
        Ok(calibrated)
    }
}
