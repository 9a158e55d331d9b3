//! Closed metric registry for the detector.
//!
//! Each variant evaluates one scalar per (hypothesis, split) from the
//! held-out labels, predictions and probabilities. A failing metric yields
//! NaN for that cell, never an aborted split.

use ndarray::{ArrayView1, ArrayView2};

use crate::bounds;
use crate::learner::Learner;

/// Metrics the detector can accumulate per hypothesis per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Accuracy,
    AucScore,
    FanosLowerBound,
    FanosAdjustedLowerBound,
    HellmannRavivUpperBound,
    SanthiVardiUpperBound,
    MidPointMi,
    LogLossMi,
    SoftmaxMi,
    PcSoftmaxMi,
    /// Direct estimate from MI-estimator-style learners; NaN when the
    /// learner does not provide one.
    EstimatedMutualInformation,
}

impl MetricKind {
    /// The default sweep the detector accumulates.
    pub fn standard_set() -> Vec<MetricKind> {
        vec![
            Self::Accuracy,
            Self::AucScore,
            Self::FanosLowerBound,
            Self::FanosAdjustedLowerBound,
            Self::HellmannRavivUpperBound,
            Self::SanthiVardiUpperBound,
            Self::MidPointMi,
            Self::LogLossMi,
            Self::PcSoftmaxMi,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::AucScore => "auc_score",
            Self::FanosLowerBound => "fanos_lower_bound",
            Self::FanosAdjustedLowerBound => "fanos_adjusted_lower_bound",
            Self::HellmannRavivUpperBound => "hellmann_raviv_upper_bound",
            Self::SanthiVardiUpperBound => "santhi_vardi_upper_bound",
            Self::MidPointMi => "mid_point_mi",
            Self::LogLossMi => "log_loss_mi",
            Self::SoftmaxMi => "softmax_mi",
            Self::PcSoftmaxMi => "pc_softmax_mi",
            Self::EstimatedMutualInformation => "estimated_mutual_information",
        }
    }

    /// Resolve a metric by its registry name.
    pub fn from_name(name: &str) -> Option<MetricKind> {
        [
            Self::Accuracy,
            Self::AucScore,
            Self::FanosLowerBound,
            Self::FanosAdjustedLowerBound,
            Self::HellmannRavivUpperBound,
            Self::SanthiVardiUpperBound,
            Self::MidPointMi,
            Self::LogLossMi,
            Self::SoftmaxMi,
            Self::PcSoftmaxMi,
            Self::EstimatedMutualInformation,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }

    pub fn evaluate(
        self,
        y_true: ArrayView1<'_, usize>,
        y_pred: ArrayView1<'_, usize>,
        proba: ArrayView2<'_, f64>,
        learner: &dyn Learner,
        x_test: ArrayView2<'_, f64>,
    ) -> f64 {
        let n_classes = bounds::observed_classes(y_true).max(2);
        let acc = bounds::accuracy(y_true, y_pred);
        match self {
            Self::Accuracy => acc,
            Self::AucScore => bounds::auc_score(y_true, proba),
            Self::FanosLowerBound => bounds::fanos_lower_bound(acc, n_classes),
            Self::FanosAdjustedLowerBound => bounds::fanos_adjusted_lower_bound(acc, n_classes),
            Self::HellmannRavivUpperBound => bounds::hellmann_raviv_upper_bound(acc, n_classes),
            Self::SanthiVardiUpperBound => bounds::santhi_vardi_upper_bound(acc, n_classes),
            Self::MidPointMi => bounds::mid_point_mi(acc, n_classes),
            Self::LogLossMi => bounds::log_loss_mi(y_true, proba),
            Self::SoftmaxMi => bounds::softmax_mi(y_true, proba),
            Self::PcSoftmaxMi => bounds::pc_softmax_mi(y_true, proba),
            Self::EstimatedMutualInformation => match learner.estimate_mi(x_test, y_true) {
                Some(Ok(value)) => value,
                Some(Err(err)) => {
                    log::warn!("estimate_mi failed ({err}); recording NaN");
                    f64::NAN
                }
                None => f64::NAN,
            },
        }
    }
}
