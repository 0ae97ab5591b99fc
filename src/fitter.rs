//! Least-squares fitter.
//!
//! [`LmFitter`] runs the Levenberg-Marquardt solver on a [`FitFunction`] and
//! packages the outcome as [`FitResults`]. Under-determined and
//! parameter-free problems never reach the solver.

use ndarray::{Array1, Array2};

use crate::error::{GasFitError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig, TerminationStatus};
use crate::problem::FitFunction;
use crate::results::FitResults;
use crate::uncertainty::{covariance_from_jacobian, standard_errors};

/// Levenberg-Marquardt fitter for [`FitFunction`]s.
#[derive(Debug, Clone, Default)]
pub struct LmFitter {
    solver: LevenbergMarquardt,
}

impl LmFitter {
    pub fn new(config: LmConfig) -> Self {
        Self {
            solver: LevenbergMarquardt::with_config(config),
        }
    }

    pub fn config(&self) -> &LmConfig {
        self.solver.config()
    }

    /// Fit `function` starting from `initial`.
    ///
    /// With `p` free parameters and `n` residuals:
    ///
    /// * `n < p`: the fit is degenerate. Every numeric field is NaN and the
    ///   termination status is [`TerminationStatus::ImproperInput`].
    /// * `p == 0`: the residuals are evaluated once; the covariance is 0x0.
    /// * otherwise the solver runs and the covariance is taken from the
    ///   Jacobian at the solution.
    ///
    /// [`FitFunction::compile_results`] is called in every case.
    pub fn fit<F>(&self, function: &mut F, initial: Array1<f64>) -> Result<FitResults>
    where
        F: FitFunction + ?Sized,
    {
        let p = function.parameter_count();
        let n = function.residual_count();
        if initial.len() != p {
            return Err(GasFitError::DimensionMismatch(format!(
                "Expected {} initial values, got {}",
                p,
                initial.len()
            )));
        }

        let mut results = if n < p {
            log::warn!(
                "degenerate fit: {} residuals for {} parameters, solver skipped",
                n,
                p
            );
            FitResults::degenerate(p, n)
        } else if p == 0 {
            let residuals = function.eval(&initial)?;
            FitResults {
                chi_square: residuals.iter().map(|r| r.powi(2)).sum(),
                residuals,
                covariance: Array2::zeros((0, 0)),
                ..FitResults::new(0, n)
            }
        } else {
            let result = self.solver.minimize(function, initial)?;
            let covariance = covariance_from_jacobian(&result.jacobian)?;
            log::debug!(
                "fit finished after {} iterations: {}",
                result.iterations,
                result.status
            );
            FitResults {
                chi_square: result.cost,
                deviations: standard_errors(&covariance),
                best_estimate: result.params,
                covariance,
                residuals: result.residuals,
                iterations: result.iterations,
                termination: result.status,
                ..FitResults::new(p, n)
            }
        };

        function.compile_results(&mut results)?;
        Ok(results)
    }
}

impl From<LmConfig> for LmFitter {
    fn from(config: LmConfig) -> Self {
        Self::new(config)
    }
}
