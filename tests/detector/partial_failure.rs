use leakmeasure::context::RunContext;
use leakmeasure::detector::{CrossValidatedLeakageDetector, DetectorConfig};
use leakmeasure::stats::DetectionPolicy;
use leakmeasure::synthetic::{SamplesPerClass, SyntheticGroundTruthGenerator};

use crate::test_helpers::{CountingCentroidFactory, FailingHypothesisFactory};

#[test]
fn one_failing_hypothesis_leaves_the_rest_usable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(80), 1.5, 42, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let base_seed = 42;
    let n_hypothesis = 5;
    let factory = FailingHypothesisFactory {
        inner: CountingCentroidFactory::new(2, 2),
        base_seed,
        n_hypothesis,
        failing_index: 2,
    };
    let mut config = DetectorConfig::new("synthetic-partial", 2, 2);
    config.cv_iterations = 3;
    config.n_hypothesis = n_hypothesis;

    let context = RunContext::new(base_seed, 2, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();

    let table = detector.results().unwrap();
    assert_eq!(table.total_hypotheses(), 5);
    assert_eq!(table.usable_count(), 4);
    assert!(!table.usable["model_2"]);
    assert!(table.errors["model_2"].contains("forced hypothesis failure"));
    // The surviving hypotheses accumulated a value per split.
    for id in ["model_0", "model_1", "model_3", "model_4"] {
        assert_eq!(table.hypotheses[id]["accuracy"].len(), 3);
    }

    // The verdict reports the reduced usable count instead of failing or
    // silently absorbing the dead hypothesis.
    let verdict = detector.detect(DetectionPolicy::PairedTTest, 0.01).unwrap();
    assert_eq!(verdict.usable_hypotheses, 4);
    assert_eq!(verdict.total_hypotheses, 5);
}

#[test]
fn all_hypotheses_failing_refuses_a_verdict() {
    let tmp = tempfile::tempdir().unwrap();
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(40), 1.0, 7, 0)
            .unwrap();
    let (x, y) = generator.generate_dataset();

    let factory = FailingHypothesisFactory {
        inner: CountingCentroidFactory::new(2, 2),
        base_seed: 7,
        n_hypothesis: 1,
        failing_index: 0,
    };
    let mut config = DetectorConfig::new("synthetic-all-fail", 2, 2);
    config.cv_iterations = 2;
    config.n_hypothesis = 1;

    let context = RunContext::new(7, 1, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();
    assert_eq!(detector.results().unwrap().usable_count(), 0);
    assert!(detector.detect(DetectionPolicy::PairedTTest, 0.01).is_err());
}
