//! Finite difference methods for numerical differentiation.
//!
//! Used as the fallback Jacobian of [`Problem`] implementations that do not
//! provide analytic derivatives, and to cross-check analytic ones in tests.

use crate::error::{GasFitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default step size for finite differences.
const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// The Jacobian is the matrix of partial derivatives of the residuals with
/// respect to the parameters: J[i,j] = ∂residual[i]/∂param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The step size for finite differences (optional)
pub fn jacobian<P>(
    problem: &mut P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>>
where
    P: Problem + ?Sized,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(GasFitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut params_perturbed = params.clone();

        // Adapt epsilon to parameter scale
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps
        } else {
            eps
        };
        params_perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&params_perturbed)?;
        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    // Leave the problem evaluated at the requested point.
    problem.eval(params)?;

    Ok(jac)
}
