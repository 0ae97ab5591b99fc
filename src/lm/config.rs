//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! Convergence tolerances, the iteration budget and the damping schedule.
//! The configuration is serializable so it can live inside a
//! [`FitterConfig`](crate::config::FitterConfig) JSON document.

use serde::{Deserialize, Serialize};

use crate::error::{GasFitError, Result};

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of iterations. Default: 100
    pub max_iterations: usize,

    /// Tolerance for the relative reduction of the cost. Default: 1e-8
    pub ftol: f64,

    /// Tolerance for the relative change in parameter values. Default: 1e-8
    pub xtol: f64,

    /// Tolerance for the gradient max-norm. Default: 1e-8
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-10
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
        }
    }
}

impl LmConfig {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for the relative cost reduction.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative parameter change.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    /// Set the tolerance for the gradient norm.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    /// Check that the damping schedule can reach `max_lambda`.
    ///
    /// Raising the damping is the only way out of a run of rejected steps, so
    /// lambda must start positive and grow by a factor above one.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(GasFitError::InvalidConfiguration(message));
        if !(self.min_lambda > 0.0 && self.min_lambda <= self.max_lambda) {
            return invalid(format!(
                "lambda bounds must satisfy 0 < min_lambda <= max_lambda, got {} and {}",
                self.min_lambda, self.max_lambda
            ));
        }
        if !(self.initial_lambda > 0.0 && self.initial_lambda.is_finite()) {
            return invalid(format!(
                "initial_lambda must be positive, got {}",
                self.initial_lambda
            ));
        }
        if !(self.lambda_up_factor > 1.0 && self.lambda_up_factor.is_finite()) {
            return invalid(format!(
                "lambda_up_factor must be greater than 1, got {}",
                self.lambda_up_factor
            ));
        }
        if !(self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return invalid(format!(
                "lambda_down_factor must lie in (0, 1), got {}",
                self.lambda_down_factor
            ));
        }
        Ok(())
    }
}
