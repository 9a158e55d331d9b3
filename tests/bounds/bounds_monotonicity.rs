use rstest::rstest;

use leakmeasure::bounds::{
    fanos_adjusted_lower_bound, fanos_lower_bound, hellmann_raviv_upper_bound,
    santhi_vardi_upper_bound,
};

/// Sampled accuracy grid strictly above chance level.
fn accuracy_grid(n_classes: usize) -> Vec<f64> {
    let chance = 1.0 / n_classes as f64;
    (1..=100)
        .map(|step| chance + (0.999 - chance) * step as f64 / 100.0)
        .collect()
}

/// All four bounds move together with accuracy: a more accurate classifier
/// certifies more extractable information, so both the lower bounds and the
/// upper bounds increase strictly. Read as functions of the error
/// probability `pe = 1 - accuracy`, the upper bounds decrease.
#[rstest]
#[case(2)]
#[case(3)]
#[case(5)]
#[case(10)]
fn bounds_increase_strictly_with_accuracy(#[case] n_classes: usize) {
    let grid = accuracy_grid(n_classes);
    for pair in grid.windows(2) {
        let (lo_acc, hi_acc) = (pair[0], pair[1]);
        assert!(
            fanos_lower_bound(hi_acc, n_classes) > fanos_lower_bound(lo_acc, n_classes),
            "fano not strictly increasing at {lo_acc} -> {hi_acc}, M={n_classes}"
        );
        assert!(
            fanos_adjusted_lower_bound(hi_acc, n_classes)
                > fanos_adjusted_lower_bound(lo_acc, n_classes),
            "adjusted fano not strictly increasing at {lo_acc} -> {hi_acc}, M={n_classes}"
        );
        assert!(
            hellmann_raviv_upper_bound(hi_acc, n_classes)
                > hellmann_raviv_upper_bound(lo_acc, n_classes),
            "hellmann-raviv not strictly increasing at {lo_acc} -> {hi_acc}, M={n_classes}"
        );
        assert!(
            santhi_vardi_upper_bound(hi_acc, n_classes)
                > santhi_vardi_upper_bound(lo_acc, n_classes),
            "santhi-vardi not strictly increasing at {lo_acc} -> {hi_acc}, M={n_classes}"
        );
    }
}

#[rstest]
#[case(2)]
#[case(5)]
fn upper_bounds_decrease_with_error_probability(#[case] n_classes: usize) {
    let grid = accuracy_grid(n_classes);
    for pair in grid.windows(2) {
        // Higher accuracy = lower pe; the bound at lower pe must be larger.
        let at_low_pe = santhi_vardi_upper_bound(pair[1], n_classes);
        let at_high_pe = santhi_vardi_upper_bound(pair[0], n_classes);
        assert!(at_low_pe > at_high_pe);
        let hr_low_pe = hellmann_raviv_upper_bound(pair[1], n_classes);
        let hr_high_pe = hellmann_raviv_upper_bound(pair[0], n_classes);
        assert!(hr_low_pe > hr_high_pe);
    }
}
