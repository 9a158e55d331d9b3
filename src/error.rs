// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the leakage-estimation engine.
//!
//! Configuration errors are raised before any fitting work begins. Numeric
//! and fit errors are recovered or isolated by the enclosing component;
//! persistence errors distinguish a missing results file from an unreadable
//! one so that both can be treated as a cache miss rather than a failure.

use std::fmt;
use std::path::PathBuf;

/// Errors produced by the leakage-estimation engine.
#[derive(Debug)]
pub enum LeakError {
    /// Invalid configuration: mismatched feature count, malformed
    /// hyperparameter range, undefined dataset or metric name.
    Config(String),
    /// A learner failed to fit. Isolated to the affected hypothesis.
    Fit(String),
    /// A locally recoverable numerical failure (degenerate probabilities,
    /// undefined AUC). Carried for logging; callers fall back per metric.
    Numeric(String),
    /// No persisted results exist for a configuration fingerprint.
    NotFound(PathBuf),
    /// A persisted results file exists but could not be parsed.
    Unreadable { path: PathBuf, detail: String },
    /// Underlying I/O failure while reading or writing results.
    Io(std::io::Error),
}

impl fmt::Display for LeakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Fit(msg) => write!(f, "fit failure: {msg}"),
            Self::Numeric(msg) => write!(f, "numerical failure: {msg}"),
            Self::NotFound(path) => {
                write!(f, "no persisted results at {}", path.display())
            }
            Self::Unreadable { path, detail } => {
                write!(f, "unreadable results file {}: {detail}", path.display())
            }
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for LeakError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LeakError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl LeakError {
    /// True for the two persistence conditions that mean "no prior results".
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unreadable { .. })
    }
}
