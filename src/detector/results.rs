// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Results accumulation and at-most-once persistence.
//!
//! A [`ResultsTable`] maps hypothesis identifiers to per-metric, per-split
//! value lists. It grows monotonically during a run and is written once at
//! the end of `fit` as a single pretty-printed JSON file named by the
//! configuration fingerprint. Loading distinguishes a missing file from an
//! unreadable one; both are treated as a cache miss by the detector.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LeakError;
use crate::search::ParamSet;

/// Stable hash identifying a detector configuration.
///
/// Derived from the learner type, its hyperparameters (sorted by key), the
/// dataset identity, the fold index, and the base seed. Identical
/// configurations map to identical fingerprints, so re-running one is a
/// cache hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationFingerprint(String);

impl ConfigurationFingerprint {
    pub fn new(
        learner_name: &str,
        params: &ParamSet,
        dataset_id: &str,
        fold_id: u64,
        base_seed: u64,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(learner_name.as_bytes());
        hasher.update(b"|");
        for (key, value) in params {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b";");
        }
        hasher.update(b"|");
        hasher.update(dataset_id.as_bytes());
        hasher.update(b"|");
        hasher.update(fold_id.to_le_bytes());
        hasher.update(base_seed.to_le_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the persisted results file under `base_dir`.
    pub fn results_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(format!("{}.json", self.0))
    }
}

/// Hypothesis identifier, `model_{i}` like the result files it is keyed by.
pub fn hypothesis_id(index: usize) -> String {
    format!("model_{index}")
}

/// Per-run results: per-hypothesis metric values, the baseline row, usable
/// flags and recorded fit errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsTable {
    /// hypothesis id -> metric name -> per-split values.
    pub hypotheses: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    /// Majority-voting baseline: metric name -> per-split values.
    pub baseline: BTreeMap<String, Vec<f64>>,
    /// hypothesis id -> fit success over the whole run.
    pub usable: BTreeMap<String, bool>,
    /// hypothesis id -> first recorded fit error.
    pub errors: BTreeMap<String, String>,
    /// Held-out samples per split, for contingency-table policies.
    pub n_test: Vec<usize>,
}

impl ResultsTable {
    /// Pre-register `n_hypothesis` entries so the table shape is fixed up
    /// front, as the run expects.
    pub fn with_hypotheses(n_hypothesis: usize, metrics: &[String]) -> Self {
        let mut table = Self::default();
        for i in 0..n_hypothesis {
            let id = hypothesis_id(i);
            let row: BTreeMap<String, Vec<f64>> =
                metrics.iter().map(|m| (m.clone(), Vec::new())).collect();
            table.hypotheses.insert(id.clone(), row);
            table.usable.insert(id, true);
        }
        table
    }

    /// Append one per-split metric value for a hypothesis.
    pub fn append(&mut self, hypothesis: &str, metric: &str, value: f64) {
        self.hypotheses
            .entry(hypothesis.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_default()
            .push(value);
    }

    pub fn append_baseline(&mut self, metric: &str, value: f64) {
        self.baseline.entry(metric.to_string()).or_default().push(value);
    }

    /// Record a fit failure: the hypothesis keeps its row but is excluded
    /// from the final statistical test.
    pub fn record_failure(&mut self, hypothesis: &str, error: &LeakError) {
        self.usable.insert(hypothesis.to_string(), false);
        self.errors
            .entry(hypothesis.to_string())
            .or_insert_with(|| error.to_string());
    }

    /// Hypothesis ids that fitted successfully on every split.
    pub fn usable_hypotheses(&self) -> Vec<&str> {
        self.usable
            .iter()
            .filter(|&(_, &ok)| ok)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn usable_count(&self) -> usize {
        self.usable.values().filter(|&&ok| ok).count()
    }

    pub fn total_hypotheses(&self) -> usize {
        self.hypotheses.len()
    }

    /// Per-split values of `metric`, averaged across usable hypotheses.
    ///
    /// Splits where a value is missing or NaN for a hypothesis simply drop
    /// that hypothesis from the average for that split.
    pub fn mean_metric_per_split(&self, metric: &str) -> Vec<f64> {
        let usable = self.usable_hypotheses();
        let n_splits = usable
            .iter()
            .filter_map(|id| self.hypotheses.get(*id))
            .filter_map(|row| row.get(metric))
            .map(|values| values.len())
            .max()
            .unwrap_or(0);
        (0..n_splits)
            .map(|split| {
                let mut sum = 0.0;
                let mut count = 0usize;
                for id in &usable {
                    if let Some(value) = self
                        .hypotheses
                        .get(*id)
                        .and_then(|row| row.get(metric))
                        .and_then(|values| values.get(split))
                    {
                        if value.is_finite() {
                            sum += value;
                            count += 1;
                        }
                    }
                }
                if count > 0 { sum / count as f64 } else { f64::NAN }
            })
            .collect()
    }

    /// Merge a partial table produced by one worker. Values are appended in
    /// worker order; failure records are kept first-wins.
    pub fn merge(&mut self, partial: ResultsTable) {
        for (id, row) in partial.hypotheses {
            for (metric, values) in row {
                for value in values {
                    self.append(&id, &metric, value);
                }
            }
        }
        for (metric, values) in partial.baseline {
            for value in values {
                self.append_baseline(&metric, value);
            }
        }
        for (id, ok) in partial.usable {
            if !ok {
                self.usable.insert(id, false);
            }
        }
        for (id, error) in partial.errors {
            self.errors.entry(id).or_insert(error);
        }
        self.n_test.extend(partial.n_test);
    }

    /// Persist to `path` as pretty JSON, creating parent directories.
    pub fn store(&self, path: &Path) -> Result<(), LeakError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LeakError::Unreadable { path: path.to_path_buf(), detail: e.to_string() })?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted table; a missing file is [`LeakError::NotFound`], a
    /// parse failure [`LeakError::Unreadable`].
    pub fn load(path: &Path) -> Result<Self, LeakError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LeakError::NotFound(path.to_path_buf()));
            }
            Err(err) => return Err(LeakError::Io(err)),
        };
        serde_json::from_str(&raw)
            .map_err(|e| LeakError::Unreadable { path: path.to_path_buf(), detail: e.to_string() })
    }
}
