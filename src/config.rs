//! Fitter configuration.
//!
//! Run-level settings of the [`DefaultFitter`](crate::orchestrator::DefaultFitter):
//! worker count, solver settings and the random source. Missing JSON fields
//! take their default values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::LmConfig;
use crate::random::DEFAULT_BUFFER_SIZE;

/// Configuration of a fitting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitterConfig {
    /// Number of worker threads. `None` uses the available hardware
    /// parallelism.
    pub worker_threads: Option<usize>,

    /// Solver settings shared by plain and Monte Carlo fits.
    pub lm: LmConfig,

    /// Seed of the Monte Carlo random source. `None` seeds from system
    /// entropy.
    pub random_seed: Option<u64>,

    /// Number of normal variates each worker fetches per refill.
    pub random_buffer_size: usize,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            lm: LmConfig::default(),
            random_seed: None,
            random_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set the solver settings.
    pub fn with_lm_config(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    /// Seed the Monte Carlo random source.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the per-worker random buffer size.
    pub fn with_random_buffer_size(mut self, size: usize) -> Self {
        self.random_buffer_size = size;
        self
    }

    /// Number of workers to run, at least one.
    pub fn worker_count(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Parse a configuration, rejecting an unusable damping schedule.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.lm.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
