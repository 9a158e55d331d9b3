// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # leakmeasure
//!
//! Statistical estimation of information leakage between a feature matrix
//! and a sensitive label: closed-form mutual-information bounds from
//! observed classification accuracy, a synthetic ground-truth generator
//! with analytically known MI, and a cross-validated multi-hypothesis
//! leakage detector with hyperparameter search, result caching and
//! significance testing.
//!
//! ## Quick Start
//!
//! ```rust
//! use leakmeasure::bounds;
//! use leakmeasure::synthetic::{
//!     ReferenceMiMethod, SamplesPerClass, SyntheticGroundTruthGenerator,
//! };
//!
//! // Accuracy 0.9 on a balanced 4-class problem certifies at least:
//! let lower = bounds::fanos_lower_bound(0.9, 4);
//! let upper = bounds::hellmann_raviv_upper_bound(0.9, 4);
//! assert!(lower <= upper);
//!
//! // Data with a known ground-truth MI for validating estimators:
//! let mut generator = SyntheticGroundTruthGenerator::new(
//!     2, 2, SamplesPerClass::Uniform(200), 0.5, 42, 0,
//! ).unwrap();
//! let (x, y) = generator.generate_dataset();
//! assert_eq!(x.nrows(), y.len());
//! let reference = generator.reference_mi(ReferenceMiMethod::BayesPredictor);
//! assert!(reference.value >= 0.0);
//! ```
//!
//! ## Architecture
//!
//! Dataset → (optional calibration) → hypothesis ensemble → bounds and
//! estimator metrics → aggregation → statistical test → verdict. The
//! synthetic generator feeds the same pipeline during validation runs,
//! supplying both the data and the ground-truth MI to compare against.
//!
//! Learning algorithms and probability calibrators are external
//! collaborators consumed through the [`learner::Learner`] and
//! [`calibration::Calibrator`] capabilities; the crate ships only the
//! deterministic references the detector itself needs (majority voting,
//! exact Bayes). All computation is batch/offline and reproducible: every
//! random draw derives from the [`context::RunContext`] base seed.

pub mod bounds;
pub mod calibration;
pub mod context;
pub mod detector;
pub mod error;
pub mod learner;
pub mod search;
pub mod stats;
pub mod synthetic;

pub use context::RunContext;
pub use detector::{
    CrossValidatedLeakageDetector, DetectorConfig, DetectorState, LeakageVerdict,
    metrics::MetricKind, results::ResultsTable,
};
pub use error::LeakError;
pub use stats::DetectionPolicy;
pub use synthetic::{MiEstimate, ReferenceMiMethod, SamplesPerClass, SyntheticGroundTruthGenerator};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
