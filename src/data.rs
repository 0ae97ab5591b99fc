//! Measured concentration data.
//!
//! A [`ConcentrationDataset`] is an ordered list of water samples. Each sample
//! carries a map from [`Gas`] to a measured [`Concentration`] (value and
//! one-sigma error) and can be enabled or disabled by the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GasFitError, Result};

/// A gas (or isotope) whose dissolved concentration can be measured.
///
/// The declaration order is the order in which residuals of one sample are
/// laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gas {
    He,
    Ne,
    Ar,
    Kr,
    Xe,
    He3,
    He4,
    Ne20,
    Ne21,
    Ne22,
    Ar36,
    Ar40,
}

impl Gas {
    /// Every supported gas, in residual order.
    pub const ALL: [Gas; 12] = [
        Gas::He,
        Gas::Ne,
        Gas::Ar,
        Gas::Kr,
        Gas::Xe,
        Gas::He3,
        Gas::He4,
        Gas::Ne20,
        Gas::Ne21,
        Gas::Ne22,
        Gas::Ar36,
        Gas::Ar40,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Gas::He => "He",
            Gas::Ne => "Ne",
            Gas::Ar => "Ar",
            Gas::Kr => "Kr",
            Gas::Xe => "Xe",
            Gas::He3 => "3He",
            Gas::He4 => "4He",
            Gas::Ne20 => "20Ne",
            Gas::Ne21 => "21Ne",
            Gas::Ne22 => "22Ne",
            Gas::Ar36 => "36Ar",
            Gas::Ar40 => "40Ar",
        }
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A concentration value with its one-sigma error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub value: f64,
    pub error: f64,
}

impl Concentration {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }
}

/// Per-sample concentrations keyed by gas.
pub type SampleConcentrations = BTreeMap<Gas, Concentration>;

/// A single water sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub enabled: bool,
    pub concentrations: SampleConcentrations,
}

impl Sample {
    /// Create an enabled sample without any measurements.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            concentrations: BTreeMap::new(),
        }
    }

    /// Builder-style helper to add a measurement.
    pub fn with_concentration(mut self, gas: Gas, value: f64, error: f64) -> Self {
        self.concentrations
            .insert(gas, Concentration::new(value, error));
        self
    }
}

/// Ordered collection of samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationDataset {
    samples: Vec<Sample>,
}

impl ConcentrationDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Enable or disable the sample at `index`.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let len = self.samples.len();
        let sample = self.samples.get_mut(index).ok_or_else(|| {
            GasFitError::InvalidConfiguration(format!(
                "sample index {} out of range for a dataset of {} samples",
                index, len
            ))
        })?;
        sample.enabled = enabled;
        Ok(())
    }

    /// Indices of all enabled samples, ascending.
    pub fn enabled_indices(&self) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.enabled)
            .map(|(i, _)| i)
            .collect()
    }
}
