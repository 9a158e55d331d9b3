// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hyperparameter search-space declaration and budgeted search.
//!
//! Each dimension is a named integer range, real range with a sampling
//! prior, or categorical set. The search itself stays behind the
//! [`SearchStrategy`] seam: the default is seeded random search, and a
//! Bayesian optimizer is an external concern, deliberately not implemented
//! here. Trial failures score worst-possible instead of aborting the
//! search, and a wall-clock budget returns the best configuration found so
//! far.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::LeakError;

/// Sampling prior for a real-valued dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prior {
    Uniform,
    LogUniform,
}

/// A single categorical choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CategoricalValue {
    Bool(bool),
    Str(String),
}

/// Typed range of one hyperparameter dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionKind {
    Integer { low: i64, high: i64 },
    Real { low: f64, high: f64, prior: Prior },
    Categorical(Vec<CategoricalValue>),
}

/// A named hyperparameter dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn integer(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self { name: name.into(), kind: DimensionKind::Integer { low, high } }
    }

    pub fn real(name: impl Into<String>, low: f64, high: f64, prior: Prior) -> Self {
        Self { name: name.into(), kind: DimensionKind::Real { low, high, prior } }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<CategoricalValue>) -> Self {
        Self { name: name.into(), kind: DimensionKind::Categorical(values) }
    }
}

/// One sampled hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Sampled assignment for every dimension, keyed by name. `BTreeMap` keeps
/// the iteration order stable for configuration fingerprints.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Declared search space: the set of dimensions, validated before any trial.
#[derive(Debug, Clone, Default)]
pub struct SearchSpace {
    dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, LeakError> {
        for dim in &dimensions {
            match &dim.kind {
                DimensionKind::Integer { low, high } => {
                    if low > high {
                        return Err(LeakError::Config(format!(
                            "integer dimension '{}' has low {low} > high {high}",
                            dim.name
                        )));
                    }
                }
                DimensionKind::Real { low, high, prior } => {
                    if !(low.is_finite() && high.is_finite()) || low > high {
                        return Err(LeakError::Config(format!(
                            "real dimension '{}' has malformed range [{low}, {high}]",
                            dim.name
                        )));
                    }
                    if *prior == Prior::LogUniform && *low <= 0.0 {
                        return Err(LeakError::Config(format!(
                            "log-uniform dimension '{}' requires low > 0, got {low}",
                            dim.name
                        )));
                    }
                }
                DimensionKind::Categorical(values) => {
                    if values.is_empty() {
                        return Err(LeakError::Config(format!(
                            "categorical dimension '{}' is empty",
                            dim.name
                        )));
                    }
                }
            }
        }
        Ok(Self { dimensions })
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn sample(&self, rng: &mut StdRng) -> ParamSet {
        let mut params = ParamSet::new();
        for dim in &self.dimensions {
            let value = match &dim.kind {
                DimensionKind::Integer { low, high } => {
                    ParamValue::Int(rng.gen_range(*low..=*high))
                }
                DimensionKind::Real { low, high, prior } => {
                    let v = match prior {
                        Prior::Uniform => rng.gen_range(*low..=*high),
                        Prior::LogUniform => {
                            let (ln_lo, ln_hi) = (low.ln(), high.ln());
                            rng.gen_range(ln_lo..=ln_hi).exp()
                        }
                    };
                    ParamValue::Real(v)
                }
                DimensionKind::Categorical(values) => {
                    match &values[rng.gen_range(0..values.len())] {
                        CategoricalValue::Bool(b) => ParamValue::Bool(*b),
                        CategoricalValue::Str(s) => ParamValue::Str(s.clone()),
                    }
                }
            };
            params.insert(dim.name.clone(), value);
        }
        params
    }
}

/// Direction of the validation loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossDirection {
    Minimize,
    Maximize,
}

impl LossDirection {
    fn worst(self) -> f64 {
        match self {
            Self::Minimize => f64::INFINITY,
            Self::Maximize => f64::NEG_INFINITY,
        }
    }

    fn better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }
}

/// Proposal strategy seam; the engine ships seeded random search only.
pub trait SearchStrategy {
    fn propose(&mut self, space: &SearchSpace) -> ParamSet;
}

/// Seeded random sampling over the declared space.
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl SearchStrategy for RandomSearch {
    fn propose(&mut self, space: &SearchSpace) -> ParamSet {
        space.sample(&mut self.rng)
    }
}

/// One scored trial.
#[derive(Debug, Clone)]
pub struct Trial {
    pub params: ParamSet,
    pub score: f64,
    pub failed: bool,
}

/// Search result: the winning configuration and the trial log.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: ParamSet,
    pub best_score: f64,
    pub trials: Vec<Trial>,
    pub budget_exhausted: bool,
    /// Winning `train_size` when the space declares that dimension;
    /// supports learning-curve-style truncated-data runs.
    pub train_size: Option<usize>,
}

/// Budgeted hyperparameter search over a declared space.
pub struct HyperparamSearch {
    space: SearchSpace,
    n_iters: usize,
    direction: LossDirection,
    budget: Option<Duration>,
}

impl HyperparamSearch {
    pub fn new(space: SearchSpace, n_iters: usize, direction: LossDirection) -> Self {
        Self { space, n_iters, direction, budget: None }
    }

    /// Wall-clock budget; on exhaustion the best configuration found so far
    /// is returned, never an error.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Run the search, scoring each proposal with `evaluate`.
    ///
    /// A failed trial is logged and scored worst-possible; it never aborts
    /// the search.
    pub fn run<F>(
        &self,
        strategy: &mut dyn SearchStrategy,
        mut evaluate: F,
    ) -> Result<SearchOutcome, LeakError>
    where
        F: FnMut(&ParamSet) -> Result<f64, LeakError>,
    {
        let started = Instant::now();
        let mut trials = Vec::with_capacity(self.n_iters);
        let mut best_params = ParamSet::new();
        let mut best_score = self.direction.worst();
        let mut budget_exhausted = false;

        for i in 0..self.n_iters {
            if let Some(budget) = self.budget {
                if started.elapsed() >= budget {
                    log::info!("search budget exhausted after {i} trials; returning best so far");
                    budget_exhausted = true;
                    break;
                }
            }
            let params = strategy.propose(&self.space);
            let (score, failed) = match evaluate(&params) {
                Ok(score) if score.is_finite() => (score, false),
                Ok(score) => {
                    log::warn!("trial {i} produced non-finite score {score}; scoring as worst");
                    (self.direction.worst(), true)
                }
                Err(err) => {
                    log::warn!("trial {i} failed ({err}); scoring as worst");
                    (self.direction.worst(), true)
                }
            };
            if !failed && (trials.is_empty() || self.direction.better(score, best_score)) {
                best_score = score;
                best_params = params.clone();
            }
            trials.push(Trial { params, score, failed });
        }

        if best_params.is_empty() {
            if let Some(first) = trials.first() {
                // Every trial failed; hand back the first proposal so the
                // caller still has a runnable configuration.
                best_params = first.params.clone();
            }
        }
        let train_size = match best_params.get("train_size") {
            Some(ParamValue::Int(v)) if *v > 0 => Some(*v as usize),
            _ => None,
        };
        Ok(SearchOutcome { best_params, best_score, trials, budget_exhausted, train_size })
    }
}
