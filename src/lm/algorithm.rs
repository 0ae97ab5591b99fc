//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Marquardt-scaled damping, Cholesky solve of the damped normal equations
//! with an SVD fallback for rank-deficient systems.

use nalgebra::DVector;
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{GasFitError, Result};
use crate::problem::Problem;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::config::LmConfig;
use super::status::TerminationStatus;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// The Jacobian matrix at the solution
    pub jacobian: Array2<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Why the solver stopped
    pub status: TerminationStatus,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Status: {}", self.status)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// The problem is left evaluated at the returned parameters.
    ///
    /// Problems with no parameters, or with fewer residuals than parameters,
    /// are not iterated and come back with
    /// [`TerminationStatus::ImproperInput`].
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    pub fn minimize<P>(&self, problem: &mut P, initial_params: Array1<f64>) -> Result<LmResult>
    where
        P: Problem + ?Sized,
    {
        self.config.validate()?;

        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(GasFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;

        if residuals.len() != problem.residual_count() {
            return Err(GasFitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                problem.residual_count(),
                residuals.len()
            )));
        }

        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(GasFitError::FunctionEvaluation(
                "non-finite residuals at the initial parameters".to_string(),
            ));
        }

        if n_params == 0 || residuals.len() < n_params {
            let jacobian = problem.jacobian(&params)?;
            return Ok(LmResult {
                params,
                residuals,
                jacobian,
                cost,
                iterations: 0,
                func_evals,
                status: TerminationStatus::ImproperInput,
            });
        }

        let config = &self.config;
        let mut lambda = config.initial_lambda;
        let mut iterations = 0;

        let status = 'outer: loop {
            let jacobian = problem.jacobian(&params)?;
            let jtj = jacobian.t().dot(&jacobian);
            let gradient = jacobian.t().dot(&residuals);

            let gradient_norm = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if gradient_norm <= config.gtol {
                break TerminationStatus::GradientTooSmall;
            }
            if iterations >= config.max_iterations {
                break TerminationStatus::TooManyIterations;
            }
            iterations += 1;

            // Inner loop: raise the damping until a step reduces the cost.
            loop {
                let step = match solve_damped_system(&jtj, &gradient, lambda) {
                    Some(step) => step,
                    None => {
                        lambda = (lambda * config.lambda_up_factor).min(config.max_lambda);
                        if lambda >= config.max_lambda {
                            break 'outer TerminationStatus::DampingSaturated;
                        }
                        continue;
                    }
                };

                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                let small_step = norm(&step) <= config.xtol * (norm(&params) + config.xtol);

                if new_cost.is_finite() && new_cost < cost {
                    let reduction = (cost - new_cost) / cost;
                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    lambda = (lambda * config.lambda_down_factor).max(config.min_lambda);

                    match (reduction <= config.ftol, small_step) {
                        (true, true) => {
                            break 'outer TerminationStatus::RelativeErrorAndReductionTooSmall
                        }
                        (true, false) => break 'outer TerminationStatus::RelativeReductionTooSmall,
                        (false, true) => break 'outer TerminationStatus::RelativeErrorTooSmall,
                        (false, false) => continue 'outer,
                    }
                }

                if small_step {
                    break 'outer TerminationStatus::RelativeErrorTooSmall;
                }
                lambda = (lambda * config.lambda_up_factor).min(config.max_lambda);
                if lambda >= config.max_lambda {
                    break 'outer TerminationStatus::DampingSaturated;
                }
            }
        };

        // The last evaluation may have been a rejected trial point.
        let residuals = problem.eval(&params)?;
        func_evals += 1;
        let jacobian = problem.jacobian(&params)?;

        log::trace!(
            "LM finished after {} iterations: {} (cost {:.6e})",
            iterations,
            status,
            cost
        );

        Ok(LmResult {
            params,
            residuals,
            jacobian,
            cost,
            iterations,
            func_evals,
            status,
        })
    }
}

fn sum_of_squares(values: &Array1<f64>) -> f64 {
    values.iter().map(|r| r.powi(2)).sum()
}

fn norm(values: &Array1<f64>) -> f64 {
    sum_of_squares(values).sqrt()
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` for the step `δ`.
///
/// Returns `None` if the damped system cannot be solved.
fn solve_damped_system(
    jtj: &Array2<f64>,
    gradient: &Array1<f64>,
    lambda: f64,
) -> Option<Array1<f64>> {
    let mut damped = jtj.clone();
    for i in 0..damped.nrows() {
        damped[[i, i]] += lambda * jtj[[i, i]].max(f64::EPSILON);
    }
    if damped.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let a = ndarray_to_nalgebra(&damped);
    let rhs: DVector<f64> = -ndarray_vec_to_nalgebra(gradient);

    let step = match a.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => a.svd(true, true).solve(&rhs, f64::EPSILON).ok()?,
    };

    if step.iter().all(|v| v.is_finite()) {
        Some(nalgebra_vec_to_ndarray(&step))
    } else {
        None
    }
}
