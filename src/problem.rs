//! Problem definition traits.
//!
//! [`Problem`] is the interface the Levenberg-Marquardt solver drives: a
//! residual vector and its Jacobian as functions of a parameter vector.
//! [`FitFunction`] adds the hook the fitter calls once a fit is finished so
//! the problem can fill in the derived parts of a [`FitResults`].
//!
//! Evaluation takes `&mut self` because problems built on physical models
//! push the parameters into the model instances they own before computing.

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::results::FitResults;

/// A nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&mut self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// Row `i`, column `j` holds ∂residual[i]/∂param[j]. The default
    /// implementation uses forward finite differences.
    fn jacobian(&mut self, params: &Array1<f64>) -> Result<Array2<f64>> {
        crate::utils::finite_difference::jacobian(self, params, None)
    }
}

/// A [`Problem`] that knows how to complete its own fit results.
pub trait FitFunction: Problem {
    /// Fill the derived fields of `results` (per-sample concentrations,
    /// propagated errors, residual tags).
    ///
    /// Called exactly once per fit, after the numeric fields (best estimate,
    /// covariance, residuals) have been set. The function is left evaluated
    /// at `results.best_estimate` unless that vector contains NaN.
    fn compile_results(&mut self, results: &mut FitResults) -> Result<()>;
}
