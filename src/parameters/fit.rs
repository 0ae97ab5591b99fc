//! Fit parameter configuration
//!
//! A [`FitParameterConfig`] is the ordered list of named unknowns the solver
//! works on. The position of a parameter in the list is its fit index.

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when editing a fit parameter configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Fit parameter '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Fit parameter '{name}' not found")]
    NotFound { name: String },

    #[error("Fit parameter index {index} out of range ({len} parameters)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A single named fit parameter with its initial value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    pub name: String,
    pub initial: f64,
}

/// Ordered, name-unique list of fit parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitParameterConfig {
    parameters: Vec<FitParameter>,
}

impl FitParameterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::DuplicateName`] if a parameter with the same
    /// name already exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use gasfit_rs::parameters::FitParameterConfig;
    ///
    /// let mut config = FitParameterConfig::new();
    /// config.add_parameter("A", 1.0).unwrap();
    /// assert!(config.add_parameter("A", 2.0).is_err());
    /// ```
    pub fn add_parameter(&mut self, name: &str, initial: f64) -> Result<(), ParameterError> {
        if self.index_of(name).is_some() {
            return Err(ParameterError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.parameters.push(FitParameter {
            name: name.to_string(),
            initial,
        });
        Ok(())
    }

    /// Remove the parameter at `index`; later parameters move up by one.
    pub fn remove_parameter(&mut self, index: usize) -> Result<FitParameter, ParameterError> {
        self.check_index(index)?;
        Ok(self.parameters.remove(index))
    }

    pub fn set_initial(&mut self, index: usize, initial: f64) -> Result<(), ParameterError> {
        self.check_index(index)?;
        self.parameters[index].initial = initial;
        Ok(())
    }

    pub fn change_parameter_initial(
        &mut self,
        name: &str,
        initial: f64,
    ) -> Result<(), ParameterError> {
        let index = self.index_of(name).ok_or_else(|| ParameterError::NotFound {
            name: name.to_string(),
        })?;
        self.parameters[index].initial = initial;
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&FitParameter> {
        self.parameters.get(index)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn initial_values(&self) -> Array1<f64> {
        self.parameters.iter().map(|p| p.initial).collect()
    }

    /// Name to fit-index lookup table.
    pub fn name_table(&self) -> HashMap<String, usize> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load a configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    fn check_index(&self, index: usize) -> Result<(), ParameterError> {
        if index >= self.parameters.len() {
            return Err(ParameterError::IndexOutOfRange {
                index,
                len: self.parameters.len(),
            });
        }
        Ok(())
    }
}
