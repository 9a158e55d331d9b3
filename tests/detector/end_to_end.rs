use approx::assert_abs_diff_eq;
use ndarray::{Array2, ArrayView1, ArrayView2};

use leakmeasure::bounds::{accuracy, fanos_lower_bound};
use leakmeasure::calibration::{CalibrationMethod, Calibrator};
use leakmeasure::context::RunContext;
use leakmeasure::detector::ensemble::CalibrationSpec;
use leakmeasure::detector::{CrossValidatedLeakageDetector, DetectorConfig};
use leakmeasure::error::LeakError;
use leakmeasure::learner::{Learner, MajorityVoting};
use leakmeasure::stats::DetectionPolicy;
use leakmeasure::synthetic::{SamplesPerClass, SyntheticGroundTruthGenerator};

use crate::test_helpers::CountingCentroidFactory;

/// The reference scenario: balanced binary data, mild separation.
///
/// A majority-voting baseline lands at the largest class prior, and the
/// Fano bound at that chance accuracy certifies (approximately) zero MI.
#[test]
fn majority_baseline_sits_at_the_class_prior() {
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(500), 0.5, 42, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let mut baseline = MajorityVoting::new(2, 2);
    baseline.fit(x.view(), y.view()).unwrap();
    let y_pred = baseline.predict(x.view()).unwrap();
    let acc = accuracy(y.view(), y_pred.view());

    let max_prior = 0.5;
    assert_abs_diff_eq!(acc, max_prior, epsilon = 0.05);
    assert_abs_diff_eq!(fanos_lower_bound(max_prior, 2), 0.0, epsilon = 1e-9);
}

#[test]
fn separated_classes_produce_a_significant_verdict() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(150), 2.0, 42, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-leaky", 2, 2);
    config.cv_iterations = 5;
    config.n_hypothesis = 3;

    let context = RunContext::new(42, 2, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();

    let verdict = detector.detect(DetectionPolicy::PairedTTest, 0.01).unwrap();
    assert!(verdict.significant, "expected leakage: {verdict:?}");
    assert!(verdict.model_mean > 0.9, "model accuracy {}", verdict.model_mean);
    assert!(verdict.baseline_mean < 0.65, "baseline {}", verdict.baseline_mean);
    assert!(verdict.implied_mi_lower_bound > 0.0);
    assert_eq!(verdict.usable_hypotheses, 3);
}

#[test]
fn indistinguishable_classes_produce_no_verdict_at_a_strict_threshold() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(150), 0.0, 43, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-flat", 2, 2);
    config.cv_iterations = 5;
    config.n_hypothesis = 3;

    let context = RunContext::new(43, 2, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();

    let verdict = detector.detect(DetectionPolicy::PairedTTest, 1e-6).unwrap();
    assert!(!verdict.significant, "no-information data flagged: {verdict:?}");
}

/// Sharpens probabilities toward their argmax, the way temperature scaling
/// with T < 1 does; a stand-in for an external calibrator.
struct Sharpening;

impl Calibrator for Sharpening {
    fn fit(
        &mut self,
        _probabilities: ArrayView2<'_, f64>,
        _labels: ArrayView1<'_, usize>,
    ) -> Result<(), LeakError> {
        Ok(())
    }

    fn transform(&self, probabilities: ArrayView2<'_, f64>) -> Result<Array2<f64>, LeakError> {
        let mut out = probabilities.to_owned();
        out.mapv_inplace(|p| p * p);
        for mut row in out.rows_mut() {
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        Ok(out)
    }
}

#[test]
fn calibrated_run_still_detects_leakage() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(120), 2.0, 45, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-calibrated", 2, 2);
    config.cv_iterations = 3;
    config.n_hypothesis = 2;

    let context = RunContext::new(45, 1, tmp.path()).unwrap();
    let spec = CalibrationSpec {
        method: CalibrationMethod::TemperatureScaling,
        build: Box::new(|| Box::new(Sharpening)),
    };
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory)
        .unwrap()
        .with_calibration(spec);
    detector.fit(x.view(), y.view()).unwrap();

    let table = detector.results().unwrap();
    assert_eq!(table.usable_count(), 2);
    // Calibrated probabilities feed the probability-based metrics.
    for values in table.hypotheses.values() {
        assert!(values["log_loss_mi"].iter().all(|v| v.is_finite()));
    }
    let verdict = detector.detect(DetectionPolicy::PairedTTest, 0.01).unwrap();
    assert!(verdict.significant);
}

#[test]
fn fisher_policies_agree_on_a_strong_effect() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(150), 2.0, 44, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-fisher", 2, 2);
    config.cv_iterations = 4;
    config.n_hypothesis = 2;

    let context = RunContext::new(44, 1, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();

    for policy in [DetectionPolicy::FisherExactMean, DetectionPolicy::FisherExactMedian] {
        let verdict = detector.detect(policy, 0.01).unwrap();
        assert!(verdict.significant, "{policy:?} missed a strong effect: {verdict:?}");
    }
}
