//! Fit configurations.
//!
//! A [`FitConfiguration`] describes one independent fitting problem: which
//! samples of the dataset are fitted together, with which model, which fit
//! parameters, and how many Monte Carlo repetitions to run. The parameter
//! map is built on demand with [`FitConfiguration::build_parameter_map`];
//! nothing derived is cached on the configuration.

use ndarray::Array1;

use crate::data::{ConcentrationDataset, SampleConcentrations};
use crate::error::{GasFitError, Result};
use crate::model::PhysicalModel;
use crate::parameters::{FitParameterConfig, ModelParameterConfig, ParameterError, ParameterMap};
use crate::residual::ResidualFunction;

/// One independent fitting problem.
///
/// Cloning deep-clones the model.
#[derive(Debug, Clone)]
pub struct FitConfiguration {
    model: Box<dyn PhysicalModel>,
    fit_parameters: FitParameterConfig,
    model_parameters: Vec<ModelParameterConfig>,
    sample_indices: Vec<usize>,
    monte_carlo_repetitions: usize,
    fixed_parameters: Vec<(String, f64)>,
}

impl FitConfiguration {
    /// Create a configuration fitting the samples at `sample_indices` of the
    /// dataset, with `model_parameters[i]` describing sample
    /// `sample_indices[i]`.
    ///
    /// # Errors
    ///
    /// Fails if the number of declarations does not match the number of
    /// samples, or if the declarations do not form a valid parameter map.
    pub fn new(
        model: Box<dyn PhysicalModel>,
        fit_parameters: FitParameterConfig,
        model_parameters: Vec<ModelParameterConfig>,
        sample_indices: Vec<usize>,
    ) -> Result<Self> {
        if model_parameters.len() != sample_indices.len() {
            return Err(GasFitError::ConfigurationMismatch(format!(
                "{} model parameter declarations for {} samples",
                model_parameters.len(),
                sample_indices.len()
            )));
        }

        let configuration = Self {
            model,
            fit_parameters,
            model_parameters,
            sample_indices,
            monte_carlo_repetitions: 0,
            fixed_parameters: Vec::new(),
        };
        configuration.build_parameter_map()?;
        Ok(configuration)
    }

    /// Set the number of Monte Carlo re-fits.
    pub fn with_monte_carlo_repetitions(mut self, repetitions: usize) -> Self {
        self.monte_carlo_repetitions = repetitions;
        self
    }

    /// Hold the fit parameter `name` at `value` in both plain and Monte
    /// Carlo fits. Fixing an already fixed parameter replaces its value.
    pub fn fix_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        if self.fit_parameters.index_of(name).is_none() {
            return Err(ParameterError::NotFound {
                name: name.to_string(),
            }
            .into());
        }
        match self.fixed_parameters.iter_mut().find(|(n, _)| n == name) {
            Some((_, fixed)) => *fixed = value,
            None => self.fixed_parameters.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Let a fixed parameter vary again. Returns whether it was fixed.
    pub fn release_parameter(&mut self, name: &str) -> bool {
        let before = self.fixed_parameters.len();
        self.fixed_parameters.retain(|(n, _)| n != name);
        self.fixed_parameters.len() != before
    }

    pub fn model(&self) -> &dyn PhysicalModel {
        self.model.as_ref()
    }

    pub fn fit_parameters(&self) -> &FitParameterConfig {
        &self.fit_parameters
    }

    pub fn model_parameters(&self) -> &[ModelParameterConfig] {
        &self.model_parameters
    }

    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    pub fn monte_carlo_repetitions(&self) -> usize {
        self.monte_carlo_repetitions
    }

    pub fn fixed_parameters(&self) -> &[(String, f64)] {
        &self.fixed_parameters
    }

    /// Fixed parameters as `(fit index, value)` pairs.
    pub fn fixed_parameter_indices(&self) -> Result<Vec<(usize, f64)>> {
        self.fixed_parameters
            .iter()
            .map(|(name, value)| {
                self.fit_parameters
                    .index_of(name)
                    .map(|index| (index, *value))
                    .ok_or_else(|| {
                        ParameterError::NotFound {
                            name: name.clone(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    /// Build the parameter map, with the fixed parameters applied.
    pub fn build_parameter_map(&self) -> Result<ParameterMap> {
        let mut map = ParameterMap::for_model(
            self.model.as_ref(),
            &self.fit_parameters,
            &self.model_parameters,
        )?;
        map.fix_parameters(&self.fixed_parameter_indices()?)?;
        Ok(map)
    }

    fn is_fixed(&self, name: &str) -> bool {
        self.fixed_parameters.iter().any(|(n, _)| n == name)
    }

    /// Names of the parameters the solver varies, in fit order.
    pub fn free_parameter_names(&self) -> Vec<String> {
        self.fit_parameters
            .iter()
            .filter(|p| !self.is_fixed(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Initial values of the parameters the solver varies.
    pub fn free_initial_values(&self) -> Array1<f64> {
        self.fit_parameters
            .iter()
            .filter(|p| !self.is_fixed(&p.name))
            .map(|p| p.initial)
            .collect()
    }

    /// Names of the fitted samples, in configuration order.
    pub fn sample_names(&self, dataset: &ConcentrationDataset) -> Result<Vec<String>> {
        self.sample_indices
            .iter()
            .map(|&i| Ok(sample(dataset, i)?.name.clone()))
            .collect()
    }

    /// Measured concentrations of the fitted samples, in configuration order.
    pub fn measured_concentrations(
        &self,
        dataset: &ConcentrationDataset,
    ) -> Result<Vec<SampleConcentrations>> {
        self.sample_indices
            .iter()
            .map(|&i| Ok(sample(dataset, i)?.concentrations.clone()))
            .collect()
    }

    /// Build the residual function of this configuration over `dataset`.
    pub fn build_residual_function(
        &self,
        dataset: &ConcentrationDataset,
    ) -> Result<ResidualFunction> {
        ResidualFunction::new(
            self.model.as_ref(),
            self.build_parameter_map()?,
            self.measured_concentrations(dataset)?,
        )
    }
}

fn sample(dataset: &ConcentrationDataset, index: usize) -> Result<&crate::data::Sample> {
    dataset.sample(index).ok_or_else(|| {
        GasFitError::InvalidConfiguration(format!(
            "sample index {} out of range ({} samples)",
            index,
            dataset.len()
        ))
    })
}
