// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed-form information-theoretic bounds and estimator metrics.
//!
//! Every function here is deterministic and side-effect-free: observed
//! classification quality in, one scalar out. The scalar forms take
//! `(accuracy, n_classes)`; the array forms take `(y_true, y_pred)` or
//! `(y_true, p_pred)` and derive the accuracy first. All bounds are in bits.
//!
//! The bounds move together with accuracy: a more accurate classifier
//! certifies a higher Fano lower bound and permits a higher Hellmann–Raviv /
//! Santhi–Vardi upper bound, and the lower bounds never exceed the upper
//! bounds for the same configuration.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Additive nudge keeping probabilities away from exact 0 before a log.
const LOG_EPS: f64 = 1e-200;

fn log2(x: f64) -> f64 {
    x.log2()
}

/// Binary entropy H_b(p) = −p·log2 p − (1−p)·log2(1−p).
///
/// `p` is clamped away from {0, 1} so the result is finite on the whole
/// closed unit interval.
pub fn binary_entropy(p: f64) -> f64 {
    let p = (p + LOG_EPS).min(1.0 - f64::EPSILON);
    -p * log2(p) - (1.0 - p) * log2(1.0 - p)
}

/// Fano lower bound on I(X; Y) from observed accuracy.
///
/// `log2(M)·(1 − pe·T) − H_b(pe)` with `T = ln(M−1)/ln(M)`. For `M == 2`
/// the correction factor degenerates to `T = 0` exactly, which is accepted.
pub fn fanos_lower_bound(accuracy: f64, n_classes: usize) -> f64 {
    let m = n_classes as f64;
    let pe = 1.0 - accuracy;
    let t = (m - 1.0).ln() / m.ln();
    log2(m) * (1.0 - pe * t) - binary_entropy(pe)
}

/// Fano lower bound without the `T` correction factor.
///
/// Looser than [`fanos_lower_bound`] but defined by the same expression for
/// every `n_classes >= 2`.
pub fn fanos_adjusted_lower_bound(accuracy: f64, n_classes: usize) -> f64 {
    let m = n_classes as f64;
    let pe = 1.0 - accuracy;
    log2(m) * (1.0 - pe) - binary_entropy(pe)
}

/// Piecewise Hellmann–Raviv function evaluated at error probability `pe`.
///
/// Selects the interval `[1−1/k, 1−1/(k+1))` containing `pe` over
/// `k = 1..n_classes−1`; when floating-point boundary effects leave `pe`
/// uncaptured, the last interval's expression is used.
fn hellmann_raviv_function(pe: f64, n_classes: usize) -> f64 {
    let local = |k: f64| -> f64 {
        log2(k) + k * (k + 1.0) * log2((k + 1.0) / k) * (pe - (k - 1.0) / k)
    };
    let mut last_k = 1.0;
    for k in 1..n_classes.max(2) {
        let k_f = k as f64;
        let lo = 1.0 - 1.0 / k_f;
        let hi = 1.0 - 1.0 / (k_f + 1.0);
        if pe >= lo && pe < hi {
            return local(k_f);
        }
        last_k = k_f;
    }
    // pe fell outside every half-open interval (pe == 1 - 1/M or rounding at
    // an interval edge); fall back to the last k.
    local(last_k)
}

/// Hellmann–Raviv upper bound on I(X; Y) from observed accuracy.
pub fn hellmann_raviv_upper_bound(accuracy: f64, n_classes: usize) -> f64 {
    let pe = 1.0 - accuracy;
    log2(n_classes as f64) - hellmann_raviv_function(pe, n_classes)
}

/// Santhi–Vardi upper bound: `log2(M) + log2(1 − pe)`.
pub fn santhi_vardi_upper_bound(accuracy: f64, n_classes: usize) -> f64 {
    let m = n_classes as f64;
    let pe = 1.0 - accuracy;
    log2(m) + log2((1.0 - pe) + LOG_EPS)
}

/// Midpoint of the Fano lower and Hellmann–Raviv upper bounds, floored at 0.
pub fn mid_point_mi(accuracy: f64, n_classes: usize) -> f64 {
    let lo = fanos_lower_bound(accuracy, n_classes);
    let hi = hellmann_raviv_upper_bound(accuracy, n_classes);
    (0.5 * (lo + hi)).max(0.0)
}

/// Fraction of matching labels.
pub fn accuracy(y_true: ArrayView1<'_, usize>, y_pred: ArrayView1<'_, usize>) -> f64 {
    assert_eq!(y_true.len(), y_pred.len(), "label arrays must match in length");
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / y_true.len() as f64
}

/// Number of distinct labels observed in `y_true`.
pub fn observed_classes(y_true: ArrayView1<'_, usize>) -> usize {
    let mut seen: Vec<usize> = y_true.iter().copied().collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Empirical class priors from dense labels over `[0, n_classes)`.
pub fn class_priors(y_true: ArrayView1<'_, usize>, n_classes: usize) -> Array1<f64> {
    let mut counts = Array1::<f64>::zeros(n_classes);
    for &y in y_true {
        counts[y] += 1.0;
    }
    let total = y_true.len().max(1) as f64;
    counts / total
}

/// Informedness (Youden's J) for binary labels: TPR + TNR − 1.
pub fn instance_informedness(
    y_true: ArrayView1<'_, usize>,
    y_pred: ArrayView1<'_, usize>,
) -> f64 {
    assert_eq!(y_true.len(), y_pred.len(), "label arrays must match in length");
    let mut tp = 0.0;
    let mut tn = 0.0;
    let mut cp = 0.0;
    let mut cn = 0.0;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t != 0 {
            cp += 1.0;
            if p != 0 {
                tp += 1.0;
            }
        } else {
            cn += 1.0;
            if p == 0 {
                tn += 1.0;
            }
        }
    }
    let tpr = if cp > 0.0 { tp / cp } else { f64::NAN };
    let tnr = if cn > 0.0 { tn / cn } else { f64::NAN };
    // nansum semantics: a missing rate contributes 0, not NaN.
    let mut inf = -1.0;
    if tpr.is_finite() {
        inf += tpr;
    }
    if tnr.is_finite() {
        inf += tnr;
    }
    inf
}

/// Binary ROC-AUC from positive-class scores via the Mann–Whitney statistic.
fn binary_auc(y_true: ArrayView1<'_, usize>, scores: ArrayView1<'_, f64>) -> Result<f64, &'static str> {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err("AUC undefined: only one class present");
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err("AUC undefined: non-finite score");
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap());
    // Midranks over tied score groups.
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = midrank;
        }
        i = j + 1;
    }
    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(y, _)| **y == 1)
        .map(|(_, r)| *r)
        .sum();
    let u = rank_sum_pos - (n_pos as f64) * (n_pos as f64 + 1.0) / 2.0;
    Ok(u / (n_pos as f64 * n_neg as f64))
}

fn one_vs_rest_auc(
    y_true: ArrayView1<'_, usize>,
    p_pred: ArrayView2<'_, f64>,
) -> Result<f64, &'static str> {
    let n_classes = p_pred.ncols();
    let mut total = 0.0;
    let mut counted = 0usize;
    for k in 0..n_classes {
        let binary: Array1<usize> = y_true.mapv(|y| usize::from(y == k));
        let scores = p_pred.index_axis(Axis(1), k);
        total += binary_auc(binary.view(), scores)?;
        counted += 1;
    }
    if counted == 0 {
        return Err("AUC undefined: no classes");
    }
    Ok(total / counted as f64)
}

/// Multi-class one-vs-rest AUC with the renormalize-and-retry policy.
///
/// A degenerate probability matrix (non-finite entries, single observed
/// class per column) fails the first attempt; rows are then normalized to
/// sum to one and the computation retried once. A second failure yields NaN
/// rather than an error so a metric sweep never aborts.
pub fn auc_score(y_true: ArrayView1<'_, usize>, p_pred: ArrayView2<'_, f64>) -> f64 {
    assert_eq!(y_true.len(), p_pred.nrows(), "labels and probability rows must match");
    if p_pred.ncols() == 2 {
        let scores = p_pred.index_axis(Axis(1), 1);
        return match binary_auc(y_true, scores) {
            Ok(auc) => auc,
            Err(reason) => {
                log::warn!("binary AUC failed ({reason}); returning NaN");
                f64::NAN
            }
        };
    }
    match one_vs_rest_auc(y_true, p_pred) {
        Ok(auc) => auc,
        Err(reason) => {
            log::warn!("AUC failed ({reason}); renormalizing rows and retrying");
            let normalized = normalize_rows(p_pred);
            match one_vs_rest_auc(y_true, normalized.view()) {
                Ok(auc) => auc,
                Err(reason) => {
                    log::warn!("AUC failed after renormalization ({reason}); returning NaN");
                    f64::NAN
                }
            }
        }
    }
}

/// Row-normalize a probability matrix; non-finite entries are zeroed first.
pub fn normalize_rows(p: ArrayView2<'_, f64>) -> ndarray::Array2<f64> {
    let mut out = p.to_owned();
    out.mapv_inplace(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });
    for mut row in out.rows_mut() {
        let sum: f64 = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        } else {
            let uniform = 1.0 / row.len() as f64;
            row.fill(uniform);
        }
    }
    out
}

/// Log-loss MI estimate: `H(Y) + mean log2 p[y_true]`, floored at 0.
///
/// With a perfectly calibrated predictor the mean log-probability of the
/// true class estimates `−H(Y|X)`, so the sum estimates `I(X; Y)`.
pub fn log_loss_mi(y_true: ArrayView1<'_, usize>, p_pred: ArrayView2<'_, f64>) -> f64 {
    assert_eq!(y_true.len(), p_pred.nrows(), "labels and probability rows must match");
    let n_classes = p_pred.ncols();
    let priors = class_priors(y_true, n_classes);
    let h_y: f64 = priors
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * log2(p))
        .sum();
    let mean_log: f64 = y_true
        .iter()
        .enumerate()
        .map(|(i, &y)| log2(p_pred[[i, y]].clamp(f64::EPSILON, 1.0 - f64::EPSILON)))
        .sum::<f64>()
        / y_true.len().max(1) as f64;
    (h_y + mean_log).max(0.0)
}

/// Plain-softmax MI estimate: mean `log2 softmax(p)[y_true] + log2 M`.
pub fn softmax_mi(y_true: ArrayView1<'_, usize>, p_pred: ArrayView2<'_, f64>) -> f64 {
    softmax_mi_impl(y_true, p_pred, false)
}

/// Prior-corrected softmax MI estimate.
///
/// Exponentials are weighted by the empirical class priors before
/// normalizing, which corrects the class-imbalance bias of the plain
/// variant.
pub fn pc_softmax_mi(y_true: ArrayView1<'_, usize>, p_pred: ArrayView2<'_, f64>) -> f64 {
    softmax_mi_impl(y_true, p_pred, true)
}

fn softmax_mi_impl(
    y_true: ArrayView1<'_, usize>,
    p_pred: ArrayView2<'_, f64>,
    prior_corrected: bool,
) -> f64 {
    assert_eq!(y_true.len(), p_pred.nrows(), "labels and probability rows must match");
    let n_classes = p_pred.ncols();
    let priors = class_priors(y_true, n_classes);
    let mut total = 0.0;
    let mut counted = 0usize;
    for (i, &y) in y_true.iter().enumerate() {
        let row = p_pred.row(i);
        let exps: Vec<f64> = row
            .iter()
            .map(|&v| v.clamp(f64::EPSILON, 1.0 - f64::EPSILON).exp())
            .collect();
        let denom: f64 = if prior_corrected {
            exps.iter().zip(priors.iter()).map(|(e, p)| e * p).sum()
        } else {
            exps.iter().sum()
        };
        if denom <= 0.0 {
            continue;
        }
        let mut mi = log2(exps[y] / denom);
        if !prior_corrected {
            mi += log2(n_classes as f64);
        }
        if mi.is_finite() {
            total += mi;
            counted += 1;
        }
    }
    if counted == 0 {
        return 0.0;
    }
    (total / counted as f64).max(0.0)
}
