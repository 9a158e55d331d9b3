use approx::assert_abs_diff_eq;
use rstest::rstest;

use leakmeasure::bounds::accuracy;
use leakmeasure::error::LeakError;
use leakmeasure::learner::{BayesPredictor, Learner};
use leakmeasure::synthetic::{SamplesPerClass, SyntheticGroundTruthGenerator};

#[test]
fn dataset_has_declared_shape_and_dense_labels() {
    let mut generator = SyntheticGroundTruthGenerator::new(
        3,
        4,
        SamplesPerClass::Uniform(50),
        0.5,
        42,
        0,
    )
    .unwrap();
    let (x, y) = generator.generate_dataset();
    assert_eq!(x.nrows(), 150);
    assert_eq!(x.ncols(), 4);
    assert_eq!(y.len(), 150);
    for k in 0..3 {
        assert_eq!(y.iter().filter(|&&label| label == k).count(), 50);
    }
}

#[test]
fn per_class_counts_set_the_priors() {
    let generator = SyntheticGroundTruthGenerator::new(
        2,
        2,
        SamplesPerClass::PerClass(vec![300, 100]),
        0.5,
        42,
        0,
    )
    .unwrap();
    let priors = generator.class_priors();
    assert_abs_diff_eq!(priors[0], 0.75, epsilon = 1e-12);
    assert_abs_diff_eq!(priors[1], 0.25, epsilon = 1e-12);
}

#[rstest]
#[case(1, 2)]
#[case(2, 0)]
fn invalid_construction_is_a_config_error(#[case] n_classes: usize, #[case] n_features: usize) {
    let result = SyntheticGroundTruthGenerator::new(
        n_classes,
        n_features,
        SamplesPerClass::Uniform(10),
        0.1,
        42,
        0,
    );
    assert!(matches!(result, Err(LeakError::Config(_))));
}

#[test]
fn mismatched_per_class_counts_are_rejected() {
    let result = SyntheticGroundTruthGenerator::new(
        3,
        2,
        SamplesPerClass::PerClass(vec![10, 10]),
        0.1,
        42,
        0,
    );
    assert!(matches!(result, Err(LeakError::Config(_))));
}

#[test]
fn same_base_seed_reproduces_identical_draws() {
    let make = || {
        SyntheticGroundTruthGenerator::new(2, 3, SamplesPerClass::Uniform(20), 0.7, 1234, 0)
            .unwrap()
    };
    let (x_a, y_a) = make().generate_dataset();
    let (x_b, y_b) = make().generate_dataset();
    assert_eq!(y_a, y_b);
    // Identical seeds drive identical draws, bit for bit.
    assert_eq!(x_a, x_b);
}

#[test]
fn repeated_draws_from_one_generator_are_independent() {
    let mut generator =
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(20), 0.5, 99, 0)
            .unwrap();
    let (x_a, _) = generator.generate_dataset();
    let (x_b, _) = generator.generate_dataset();
    assert!(x_a.iter().zip(x_b.iter()).any(|(a, b)| a != b));
}

#[test]
fn posterior_rows_sum_to_one() {
    let mut generator =
        SyntheticGroundTruthGenerator::new(3, 2, SamplesPerClass::Uniform(40), 0.8, 7, 0)
            .unwrap();
    let (x, _) = generator.generate_dataset();
    let posterior = generator.posterior_matrix(&x);
    for row in posterior.rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}

#[test]
fn posterior_matches_priors_when_classes_coincide() {
    // distance = 0 makes every class conditional identical, so the exact
    // posterior reduces to the class priors everywhere.
    let mut generator = SyntheticGroundTruthGenerator::new(
        2,
        2,
        SamplesPerClass::PerClass(vec![60, 20]),
        0.0,
        11,
        0,
    )
    .unwrap();
    let (x, _) = generator.generate_dataset();
    for row in x.rows() {
        assert_abs_diff_eq!(generator.posterior(row, 0), 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(generator.posterior(row, 1), 0.25, epsilon = 1e-9);
    }
}

#[test]
fn bayes_predictor_tracks_class_separability() {
    let make = |distance: f64| {
        SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(200), distance, 31, 0)
            .unwrap()
    };

    // Well separated classes: the exact posterior is nearly perfect.
    let mut generator = make(2.0);
    let (x, y) = generator.generate_dataset();
    let mut bayes = BayesPredictor::new(make(2.0));
    bayes.fit(x.view(), y.view()).unwrap();
    let y_pred = bayes.predict(x.view()).unwrap();
    assert!(accuracy(y.view(), y_pred.view()) > 0.95);

    // Identical classes: even the Bayes predictor sits at chance.
    let mut generator = make(0.0);
    let (x, y) = generator.generate_dataset();
    let mut bayes = BayesPredictor::new(make(0.0));
    bayes.fit(x.view(), y.view()).unwrap();
    let y_pred = bayes.predict(x.view()).unwrap();
    let acc = accuracy(y.view(), y_pred.view());
    assert!((0.35..=0.65).contains(&acc), "chance-level accuracy, got {acc}");
}

#[test]
fn larger_distance_separates_the_class_means() {
    let near = SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(10), 0.1, 5, 0)
        .unwrap();
    let far = SyntheticGroundTruthGenerator::new(2, 2, SamplesPerClass::Uniform(10), 2.0, 5, 0)
        .unwrap();
    let gap = |generator: &SyntheticGroundTruthGenerator| {
        let a = generator.distribution(0).mean();
        let b = generator.distribution(1).mean();
        (b - a).dot(&(b - a)).sqrt()
    };
    assert!(gap(&far) > gap(&near));
}
