//! Statistical significance tests backing the leakage verdict.
//!
//! The detector compares a model's per-split metric distribution against the
//! majority-voting baseline with one of the named policies: a paired t-test
//! on the raw values, or Fisher's exact test on a confusion-style 2x2 table
//! built at the mean or median of the distribution.

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::gamma::ln_gamma;

use crate::error::LeakError;

/// Named, swappable significance-test policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPolicy {
    /// One-sided paired t-test on per-split metric values.
    PairedTTest,
    /// Fisher's exact test on the contingency table at the distribution mean.
    FisherExactMean,
    /// Fisher's exact test on the contingency table at the distribution median.
    FisherExactMedian,
}

impl DetectionPolicy {
    pub fn name(self) -> &'static str {
        match self {
            Self::PairedTTest => "paired_ttest",
            Self::FisherExactMean => "fisher_exact_mean",
            Self::FisherExactMedian => "fisher_exact_median",
        }
    }
}

/// Result of one significance test.
#[derive(Debug, Clone, Copy)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// One-sided paired t-test for `mean(xs - ys) > 0`.
///
/// Returns p = 1 when the differences are constant (zero variance): a flat
/// difference carries no evidence either way under the t model.
pub fn paired_t_test(xs: &[f64], ys: &[f64]) -> Result<TestResult, LeakError> {
    if xs.len() != ys.len() {
        return Err(LeakError::Config(format!(
            "paired samples differ in length: {} vs {}",
            xs.len(),
            ys.len()
        )));
    }
    let n = xs.len();
    if n < 2 {
        return Err(LeakError::Config("paired t-test needs at least two pairs".into()));
    }
    let diffs: Vec<f64> = xs.iter().zip(ys.iter()).map(|(x, y)| x - y).collect();
    let n_f = n as f64;
    let mean = diffs.iter().sum::<f64>() / n_f;
    let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n_f - 1.0);
    if var <= 0.0 {
        let statistic = if mean > 0.0 { f64::INFINITY } else { 0.0 };
        let p_value = if mean > 0.0 { 0.0 } else { 1.0 };
        return Ok(TestResult { statistic, p_value });
    }
    let statistic = mean / (var / n_f).sqrt();
    let dist = StudentsT::new(0.0, 1.0, n_f - 1.0)
        .map_err(|e| LeakError::Numeric(format!("t distribution: {e}")))?;
    let p_value = 1.0 - dist.cdf(statistic);
    Ok(TestResult { statistic, p_value })
}

fn ln_choose(n: u64, k: u64) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
}

/// Hypergeometric log-probability of table `[[a, b], [c, d]]` with fixed
/// margins.
fn ln_hypergeom(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let n = a + b + c + d;
    ln_choose(a + b, a) + ln_choose(c + d, c) - ln_choose(n, a + c)
}

/// One-sided (greater) Fisher's exact test on a 2x2 contingency table.
///
/// Tests whether the first row's success rate exceeds the second row's by
/// summing hypergeometric probabilities of tables at least as extreme.
pub fn fisher_exact_greater(table: [[u64; 2]; 2]) -> Result<TestResult, LeakError> {
    let [[a, b], [c, d]] = table;
    if a + b == 0 || c + d == 0 {
        return Err(LeakError::Config("fisher exact: a table row is empty".into()));
    }
    // Tables at least as extreme: shift counts along the diagonal with the
    // margins fixed; the shift is bounded by min(b, c).
    let observed = ln_hypergeom(a, b, c, d);
    let mut p_value = 0.0;
    for shift in 0..=b.min(c) {
        p_value += ln_hypergeom(a + shift, b - shift, c - shift, d + shift).exp();
    }
    Ok(TestResult { statistic: observed.exp(), p_value: p_value.min(1.0) })
}

/// Confusion-style contingency table at a representative accuracy point.
///
/// `n_test` held-out samples at `model_accuracy` vs `baseline_accuracy`
/// become correct/incorrect counts per row.
pub fn accuracy_contingency_table(
    model_accuracy: f64,
    baseline_accuracy: f64,
    n_test: usize,
) -> [[u64; 2]; 2] {
    let n = n_test as f64;
    let model_correct = (model_accuracy.clamp(0.0, 1.0) * n).round() as u64;
    let baseline_correct = (baseline_accuracy.clamp(0.0, 1.0) * n).round() as u64;
    [
        [model_correct, n_test as u64 - model_correct],
        [baseline_correct, n_test as u64 - baseline_correct],
    ]
}

/// Mean over the finite entries; NaN cells are skipped, not propagated.
pub fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Median over the finite entries; NaN cells are skipped, not propagated.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Apply a detection policy to per-split model values vs baseline values.
pub fn run_policy(
    policy: DetectionPolicy,
    model_values: &[f64],
    baseline_values: &[f64],
    n_test: usize,
) -> Result<TestResult, LeakError> {
    match policy {
        DetectionPolicy::PairedTTest => paired_t_test(model_values, baseline_values),
        DetectionPolicy::FisherExactMean => fisher_exact_greater(accuracy_contingency_table(
            mean(model_values),
            mean(baseline_values),
            n_test,
        )),
        DetectionPolicy::FisherExactMedian => fisher_exact_greater(accuracy_contingency_table(
            median(model_values),
            median(baseline_values),
            n_test,
        )),
    }
}
