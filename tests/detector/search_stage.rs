use leakmeasure::context::RunContext;
use leakmeasure::detector::{CrossValidatedLeakageDetector, DetectorConfig, DetectorState};
use leakmeasure::search::{Dimension, Prior, SearchSpace};
use leakmeasure::synthetic::{SamplesPerClass, SyntheticGroundTruthGenerator};

use crate::test_helpers::CountingCentroidFactory;

fn dataset(seed: u64) -> (ndarray::Array2<f64>, ndarray::Array1<usize>) {
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(100), 1.5, seed, 0)
            .unwrap();
    generator.generate_dataset()
}

#[test]
fn search_stage_runs_before_cross_validation() {
    let tmp = tempfile::tempdir().unwrap();
    let (x, y) = dataset(42);

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-search", 2, 2);
    config.cv_iterations = 2;
    config.n_hypothesis = 2;
    config.search_space = SearchSpace::new(vec![
        Dimension::integer("depth", 1, 4),
        Dimension::real("rate", 1e-3, 1.0, Prior::LogUniform),
    ])
    .unwrap();
    config.search_iterations = 6;

    let context = RunContext::new(42, 1, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();
    assert_eq!(detector.state(), DetectorState::ResultsPersisted);

    let outcome = detector.search_outcome().unwrap();
    assert_eq!(outcome.trials.len(), 6);
    assert!(outcome.best_params.contains_key("depth"));
    assert!(outcome.best_score.is_finite());
}

#[test]
fn searched_train_size_truncates_the_training_fold() {
    let tmp = tempfile::tempdir().unwrap();
    let (x, y) = dataset(21);

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-train-size", 2, 2);
    config.cv_iterations = 2;
    config.n_hypothesis = 1;
    config.search_space =
        SearchSpace::new(vec![Dimension::integer("train_size", 40, 40)]).unwrap();
    config.search_iterations = 2;

    let context = RunContext::new(21, 1, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();

    assert_eq!(detector.search_outcome().unwrap().train_size, Some(40));
    // The run completes and accumulates one value per split on the
    // truncated training data.
    let table = detector.results().unwrap();
    assert_eq!(table.hypotheses["model_0"]["accuracy"].len(), 2);
}

#[test]
fn empty_search_space_skips_the_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let (x, y) = dataset(9);

    let factory = CountingCentroidFactory::new(2, 2);
    let mut config = DetectorConfig::new("synthetic-no-search", 2, 2);
    config.cv_iterations = 2;
    config.n_hypothesis = 1;

    let context = RunContext::new(9, 1, tmp.path()).unwrap();
    let mut detector = CrossValidatedLeakageDetector::new(context, config, &factory).unwrap();
    detector.fit(x.view(), y.view()).unwrap();
    assert!(detector.search_outcome().is_none());
}
