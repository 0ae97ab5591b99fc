//! A model whose concentrations are linear in the model parameters.
//!
//! For every gas `g` the concentration is `C_g = sum_k a_gk * p_k`. A subset
//! of the parameters is flagged as forming the equilibrium component, so
//! `Ceq_g` sums only over those. This covers end-member mixing models and
//! linearized excess-air models, and is cheap enough to drive the fitting
//! machinery in tests and benchmarks.

use std::collections::BTreeMap;

use ndarray::Array1;

use crate::data::Gas;
use crate::error::{GasFitError, Result};
use crate::model::PhysicalModel;

/// Linear-in-parameters gas model.
#[derive(Debug, Clone)]
pub struct LinearGasModel {
    names: Vec<String>,
    coefficients: BTreeMap<Gas, Array1<f64>>,
    equilibrium: Vec<bool>,
    parameters: Array1<f64>,
}

impl LinearGasModel {
    /// Create a model with the given parameter names and no gases.
    ///
    /// All parameters initially count towards the equilibrium component.
    pub fn new(parameter_names: &[&str]) -> Self {
        let n = parameter_names.len();
        Self {
            names: parameter_names.iter().map(|s| s.to_string()).collect(),
            coefficients: BTreeMap::new(),
            equilibrium: vec![true; n],
            parameters: Array1::zeros(n),
        }
    }

    /// Add the coefficient row for `gas`.
    pub fn with_gas(mut self, gas: Gas, coefficients: &[f64]) -> Result<Self> {
        if coefficients.len() != self.names.len() {
            return Err(GasFitError::DimensionMismatch(format!(
                "gas {} needs {} coefficients, got {}",
                gas,
                self.names.len(),
                coefficients.len()
            )));
        }
        self.coefficients
            .insert(gas, Array1::from_vec(coefficients.to_vec()));
        Ok(self)
    }

    /// Restrict the equilibrium component to the named parameters.
    pub fn with_equilibrium_parameters(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            if !self.names.iter().any(|n| n == name) {
                return Err(GasFitError::InvalidConfiguration(format!(
                    "'{}' is not a parameter of this model",
                    name
                )));
            }
        }
        self.equilibrium = self
            .names
            .iter()
            .map(|n| names.iter().any(|e| e == n))
            .collect();
        Ok(self)
    }

    pub fn parameters(&self) -> &Array1<f64> {
        &self.parameters
    }

    fn row(&self, gas: Gas) -> Result<&Array1<f64>> {
        self.coefficients.get(&gas).ok_or_else(|| {
            GasFitError::FunctionEvaluation(format!("gas {} is not described by the model", gas))
        })
    }

    fn equilibrium_row(&self, gas: Gas) -> Result<Array1<f64>> {
        let row = self.row(gas)?;
        Ok(row
            .iter()
            .zip(self.equilibrium.iter())
            .map(|(a, &eq)| if eq { *a } else { 0.0 })
            .collect())
    }
}

impl PhysicalModel for LinearGasModel {
    fn clone_model(&self) -> Box<dyn PhysicalModel> {
        Box::new(self.clone())
    }

    fn parameter_names(&self) -> &[String] {
        &self.names
    }

    fn set_parameters(&mut self, parameters: &Array1<f64>) -> Result<()> {
        if parameters.len() != self.names.len() {
            return Err(GasFitError::DimensionMismatch(format!(
                "expected {} model parameters, got {}",
                self.names.len(),
                parameters.len()
            )));
        }
        self.parameters.assign(parameters);
        Ok(())
    }

    fn concentration(&self, gas: Gas) -> Result<f64> {
        Ok(self.row(gas)?.dot(&self.parameters))
    }

    fn equilibrium_concentration(&self, gas: Gas) -> Result<f64> {
        Ok(self.equilibrium_row(gas)?.dot(&self.parameters))
    }

    fn derivatives(&self, gas: Gas) -> Result<Array1<f64>> {
        Ok(self.row(gas)?.clone())
    }

    fn equilibrium_derivatives(&self, gas: Gas) -> Result<Array1<f64>> {
        self.equilibrium_row(gas)
    }
}
