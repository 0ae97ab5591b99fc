//! Per-sample model parameter declarations
//!
//! Every sample of a fit configuration declares, for each parameter its
//! physical model requires, whether the parameter is held at a literal value
//! or bound to a named fit parameter.

use serde::{Deserialize, Serialize};

/// How a single model parameter gets its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelParameterBinding {
    /// Held at a literal value.
    Fixed(f64),
    /// Bound to the fit parameter with this name.
    Fitted(String),
}

/// Ordered model parameter declarations for one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameterConfig {
    declarations: Vec<(String, ModelParameterBinding)>,
}

impl ModelParameterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` as fixed to `value`.
    pub fn set_fixed(&mut self, name: &str, value: f64) {
        self.set(name, ModelParameterBinding::Fixed(value));
    }

    /// Declare `name` as bound to the fit parameter `fit_parameter`.
    pub fn set_fitted(&mut self, name: &str, fit_parameter: &str) {
        self.set(name, ModelParameterBinding::Fitted(fit_parameter.to_string()));
    }

    /// Builder form of [`set_fixed`](Self::set_fixed).
    pub fn fixed(mut self, name: &str, value: f64) -> Self {
        self.set_fixed(name, value);
        self
    }

    /// Builder form of [`set_fitted`](Self::set_fitted).
    pub fn fitted(mut self, name: &str, fit_parameter: &str) -> Self {
        self.set_fitted(name, fit_parameter);
        self
    }

    /// Insert or replace a declaration. A replaced declaration keeps its position.
    pub fn set(&mut self, name: &str, binding: ModelParameterBinding) {
        match self.declarations.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = binding,
            None => self.declarations.push((name.to_string(), binding)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelParameterBinding> {
        self.declarations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    pub fn remove(&mut self, name: &str) -> Option<ModelParameterBinding> {
        let index = self.declarations.iter().position(|(n, _)| n == name)?;
        Some(self.declarations.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelParameterBinding)> {
        self.declarations.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
