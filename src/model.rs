//! Physical model interface.
//!
//! This module defines the [`PhysicalModel`] trait, the interface the fitting
//! core needs from a concrete dissolved-gas model (equilibrium concentration
//! plus excess air, fractionation, ...). The core never knows which model it
//! drives: it clones one instance per sample, pushes per-sample parameter
//! vectors into it, and asks for concentrations and derivatives per gas.

use ndarray::Array1;
use std::fmt;

use crate::data::Gas;
use crate::error::Result;

/// A per-sample physical model of dissolved-gas concentrations.
///
/// Model parameters are identified by name and laid out in the fixed order
/// returned by [`parameter_names`](PhysicalModel::parameter_names). Every
/// vector exchanged with the model (parameters, derivative rows) uses that
/// order.
pub trait PhysicalModel: Send + Sync + fmt::Debug {
    /// Create an independent deep copy of this model.
    fn clone_model(&self) -> Box<dyn PhysicalModel>;

    /// Names of the parameters the model requires, in model order.
    fn parameter_names(&self) -> &[String];

    /// Whether `name` is a parameter known to this model.
    fn is_model_parameter(&self, name: &str) -> bool {
        self.parameter_names().iter().any(|n| n == name)
    }

    /// Set the model parameters, in model order.
    fn set_parameters(&mut self, parameters: &Array1<f64>) -> Result<()>;

    /// Modeled concentration of `gas` for the current parameters.
    fn concentration(&self, gas: Gas) -> Result<f64>;

    /// Modeled equilibrium (solubility) part of the concentration of `gas`.
    fn equilibrium_concentration(&self, gas: Gas) -> Result<f64>;

    /// Derivatives of [`concentration`](PhysicalModel::concentration) with
    /// respect to every model parameter, in model order.
    fn derivatives(&self, gas: Gas) -> Result<Array1<f64>>;

    /// Derivatives of the equilibrium concentration with respect to every
    /// model parameter, in model order.
    fn equilibrium_derivatives(&self, gas: Gas) -> Result<Array1<f64>>;

    /// Called whenever the set of fitted parameters changes.
    ///
    /// `fitted_indices[i]` is the model-parameter position bound to fit
    /// parameter `i`, or `None` if this sample does not use it. Models that
    /// only need to differentiate with respect to fitted parameters can use
    /// this to skip work; the default ignores it.
    fn setup_derivatives(&mut self, _fitted_indices: &[Option<usize>]) {}
}

impl Clone for Box<dyn PhysicalModel> {
    fn clone(&self) -> Self {
        self.clone_model()
    }
}
