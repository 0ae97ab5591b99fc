//! # Covariance Matrix Calculations
//!
//! Covariance of the fitted parameters from the Jacobian at the solution,
//! and first-order propagation of that covariance to derived quantities.

use ndarray::{Array1, Array2};

use crate::error::{GasFitError, Result};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Component size above which a parameter counts as part of a null-space
/// direction of `JᵀJ`.
const NULL_SPACE_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Calculate the parameter covariance matrix from the Jacobian.
///
/// For residuals already weighted by their measurement errors the covariance
/// is `inv(JᵀJ)`. The inverse is taken as an SVD pseudo-inverse that discards
/// singular values below `ε · σmax · p`.
///
/// Parameters the data cannot constrain (those with a component in a
/// discarded direction) get an infinite variance and NaN covariances with
/// every other parameter. The remaining block is the pseudo-inverse.
///
/// A Jacobian with non-finite entries yields a NaN-filled matrix.
pub fn covariance_from_jacobian(jacobian: &Array2<f64>) -> Result<Array2<f64>> {
    let p = jacobian.ncols();
    if p == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Ok(Array2::from_elem((p, p), f64::NAN));
    }

    let jtj = ndarray_to_nalgebra(&jacobian.t().dot(jacobian));
    let svd = jtj.svd(true, true);
    let sigma_max = svd.singular_values.iter().fold(0.0_f64, |m, s| m.max(*s));
    let threshold = f64::EPSILON * sigma_max * p as f64;

    let v_t = svd.v_t.as_ref().ok_or_else(|| {
        GasFitError::LinearAlgebraError("SVD without right singular vectors".to_string())
    })?;
    let unconstrained: Vec<usize> = (0..p)
        .filter(|&j| {
            svd.singular_values
                .iter()
                .enumerate()
                .any(|(k, s)| *s <= threshold && v_t[(k, j)].abs() > NULL_SPACE_TOLERANCE)
        })
        .collect();

    let inverse = svd
        .pseudo_inverse(threshold)
        .map_err(|e| GasFitError::LinearAlgebraError(e.to_string()))?;
    let mut covariance = nalgebra_to_ndarray(&inverse);
    for &j in &unconstrained {
        covariance.row_mut(j).fill(f64::NAN);
        covariance.column_mut(j).fill(f64::NAN);
        covariance[[j, j]] = f64::INFINITY;
    }
    Ok(covariance)
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements. Tiny
/// negative round-off on the diagonal maps to zero; NaN stays NaN.
pub fn standard_errors(covariance: &Array2<f64>) -> Array1<f64> {
    covariance
        .diag()
        .mapv(|v| if v < 0.0 { 0.0 } else { v.sqrt() })
}

/// Propagate a parameter covariance through a Jacobian of derived values.
///
/// Returns `sqrt(diag(J · C · Jᵀ))`, the first-order standard error of every
/// derived value (one per Jacobian row). Parameters a value has a zero
/// derivative for do not contribute, so an unconstrained parameter only
/// makes the errors of the values that depend on it undefined.
pub fn propagate_errors(jacobian: &Array2<f64>, covariance: &Array2<f64>) -> Result<Array1<f64>> {
    if jacobian.ncols() != covariance.nrows() || covariance.nrows() != covariance.ncols() {
        return Err(GasFitError::DimensionMismatch(format!(
            "cannot propagate a {}x{} covariance through a {}x{} Jacobian",
            covariance.nrows(),
            covariance.ncols(),
            jacobian.nrows(),
            jacobian.ncols()
        )));
    }

    let mut errors = Array1::zeros(jacobian.nrows());
    for (row, error) in jacobian.rows().into_iter().zip(errors.iter_mut()) {
        let mut variance = 0.0;
        for (j, &dj) in row.iter().enumerate().filter(|(_, d)| **d != 0.0) {
            for (k, &dk) in row.iter().enumerate().filter(|(_, d)| **d != 0.0) {
                variance += dj * covariance[[j, k]] * dk;
            }
        }
        *error = if variance < 0.0 { 0.0 } else { variance.sqrt() };
    }
    Ok(errors)
}

/// Calculate the correlation matrix from a covariance matrix.
///
/// `correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])`; entries whose
/// variances are not positive are reported as zero off the diagonal.
pub fn correlation(covariance: &Array2<f64>) -> Array2<f64> {
    let n = covariance.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            if i == j {
                correl[[i, j]] = 1.0;
            } else {
                let denom = (covariance[[i, i]] * covariance[[j, j]]).sqrt();
                if denom > 0.0 {
                    correl[[i, j]] = covariance[[i, j]] / denom;
                }
            }
        }
    }

    correl
}
