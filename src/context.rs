// SPDX-FileCopyrightText: 2025-2026 Carlson Büth <code@cbueth.de>
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit run context: base random source, parallelism cap, output
//! directory.
//!
//! Reproducibility is a constructor argument here, not an environment side
//! effect: every component derives its random state from the context's base
//! seed plus a stable integer offset, so two runs with the same base seed
//! produce identical sample draws, splits and hypothesis initializations.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::LeakError;

/// Run-wide context passed into the detector and generator constructors.
#[derive(Debug, Clone)]
pub struct RunContext {
    base_seed: u64,
    n_jobs: usize,
    output_dir: PathBuf,
}

impl RunContext {
    /// Maximum accepted worker count. External learners are often themselves
    /// CPU-bound; oversubscription degrades wall-clock time.
    pub const MAX_JOBS: usize = 10;

    pub fn new(
        base_seed: u64,
        n_jobs: usize,
        output_dir: impl AsRef<Path>,
    ) -> Result<Self, LeakError> {
        if n_jobs == 0 || n_jobs > Self::MAX_JOBS {
            return Err(LeakError::Config(format!(
                "n_jobs must be in [1, {}], got {n_jobs}",
                Self::MAX_JOBS
            )));
        }
        Ok(Self {
            base_seed,
            n_jobs,
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Random source seeded by the base seed alone.
    pub fn base_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.base_seed)
    }

    /// Random source for a derived purpose (class, fold, hypothesis).
    ///
    /// The seed is a fresh draw from the base source in `[0, 2^31)` plus the
    /// integer offset, matching how the generator derives per-class seeds.
    pub fn derived_rng(&self, offset: u64) -> StdRng {
        let mut base = self.base_rng();
        let draw: u32 = base.gen_range(0..1u32 << 31);
        StdRng::seed_from_u64(u64::from(draw) + offset)
    }
}
