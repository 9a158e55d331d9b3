use approx::assert_abs_diff_eq;
use ndarray::array;

use leakmeasure::bounds::{
    class_priors, instance_informedness, log_loss_mi, pc_softmax_mi, softmax_mi,
};

#[test]
fn log_loss_mi_is_zero_for_prior_only_predictions() {
    // A predictor that always outputs the class priors carries no
    // information beyond H(Y), so the estimate collapses to zero.
    let y = array![0usize, 0, 1, 1];
    let proba = array![[0.5, 0.5], [0.5, 0.5], [0.5, 0.5], [0.5, 0.5]];
    assert_abs_diff_eq!(log_loss_mi(y.view(), proba.view()), 0.0, epsilon = 1e-9);
}

#[test]
fn log_loss_mi_approaches_label_entropy_for_confident_predictions() {
    let y = array![0usize, 0, 1, 1];
    let proba = array![[0.99, 0.01], [0.99, 0.01], [0.01, 0.99], [0.01, 0.99]];
    let mi = log_loss_mi(y.view(), proba.view());
    assert!(mi > 0.9 && mi <= 1.0, "mi = {mi}");
}

#[test]
fn softmax_variants_are_zero_for_uninformative_posteriors() {
    let y = array![0usize, 0, 1, 1];
    let proba = array![[0.5, 0.5], [0.5, 0.5], [0.5, 0.5], [0.5, 0.5]];
    assert_abs_diff_eq!(softmax_mi(y.view(), proba.view()), 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(pc_softmax_mi(y.view(), proba.view()), 0.0, epsilon = 1e-9);
}

#[test]
fn softmax_variants_grow_with_posterior_confidence() {
    let y = array![0usize, 0, 1, 1];
    let sharp = array![[0.95, 0.05], [0.95, 0.05], [0.05, 0.95], [0.05, 0.95]];
    let flat = array![[0.55, 0.45], [0.55, 0.45], [0.45, 0.55], [0.45, 0.55]];
    assert!(softmax_mi(y.view(), sharp.view()) > softmax_mi(y.view(), flat.view()));
    assert!(pc_softmax_mi(y.view(), sharp.view()) > pc_softmax_mi(y.view(), flat.view()));
}

#[test]
fn pc_softmax_corrects_for_class_imbalance() {
    // Imbalanced labels with prior-only predictions: the prior-corrected
    // variant stays at zero while the plain variant is biased upward by the
    // majority class.
    let y = array![0usize, 0, 0, 0, 0, 0, 1, 1];
    let priors = class_priors(y.view(), 2);
    let proba = ndarray::Array2::from_shape_fn((8, 2), |(_, k)| priors[k]);
    let pc = pc_softmax_mi(y.view(), proba.view());
    let plain = softmax_mi(y.view(), proba.view());
    assert!(pc <= plain + 1e-12, "pc = {pc}, plain = {plain}");
    assert_abs_diff_eq!(pc, 0.0, epsilon = 0.05);
}

#[test]
fn informedness_is_zero_for_constant_predictions() {
    let y = array![0usize, 1, 0, 1];
    let constant = array![1usize, 1, 1, 1];
    assert_abs_diff_eq!(instance_informedness(y.view(), constant.view()), 0.0, epsilon = 1e-12);
}

#[test]
fn informedness_is_one_for_perfect_predictions() {
    let y = array![0usize, 1, 0, 1];
    assert_abs_diff_eq!(instance_informedness(y.view(), y.view()), 1.0, epsilon = 1e-12);
}
