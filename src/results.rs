//! Fit results.
//!
//! A [`FitResults`] value is created fresh for every fit. The fitter fills
//! the numeric fields from the solver output; the fit function then fills the
//! per-sample concentrations and the residual tags.

use std::fmt;

use ndarray::{Array1, Array2};

use crate::data::{Gas, SampleConcentrations};
use crate::lm::TerminationStatus;
use crate::uncertainty;

/// Identifies the measurement a residual belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidualTag {
    /// Position of the sample within the fit configuration.
    pub sample: usize,
    pub gas: Gas,
}

/// Outcome of one least-squares fit.
#[derive(Debug, Clone)]
pub struct FitResults {
    /// Sum of squared (error-weighted) residuals.
    pub chi_square: f64,
    /// Fitted values of the free fit parameters.
    pub best_estimate: Array1<f64>,
    /// Standard errors of the free fit parameters.
    pub deviations: Array1<f64>,
    pub covariance: Array2<f64>,
    /// `(measured - modeled) / error` for every measured gas of every sample.
    pub residuals: Array1<f64>,
    /// Parallel to `residuals`.
    pub residual_tags: Vec<ResidualTag>,
    pub iterations: usize,
    /// Residual count minus free parameter count; negative for
    /// under-determined fits.
    pub degrees_of_freedom: i64,
    pub termination: TerminationStatus,
    /// Modeled concentrations with propagated errors, one map per sample.
    pub model_concentrations: Vec<SampleConcentrations>,
    /// Modeled equilibrium concentrations with propagated errors.
    pub equilibrium_concentrations: Vec<SampleConcentrations>,
    /// The concentrations the fit was run against.
    pub measured_concentrations: Vec<SampleConcentrations>,
}

impl FitResults {
    /// An empty result for `parameter_count` parameters and
    /// `residual_count` residuals, everything zeroed.
    pub fn new(parameter_count: usize, residual_count: usize) -> Self {
        Self {
            chi_square: 0.0,
            best_estimate: Array1::zeros(parameter_count),
            deviations: Array1::zeros(parameter_count),
            covariance: Array2::zeros((parameter_count, parameter_count)),
            residuals: Array1::zeros(residual_count),
            residual_tags: Vec::new(),
            iterations: 0,
            degrees_of_freedom: residual_count as i64 - parameter_count as i64,
            termination: TerminationStatus::NotStarted,
            model_concentrations: Vec::new(),
            equilibrium_concentrations: Vec::new(),
            measured_concentrations: Vec::new(),
        }
    }

    /// The result of a fit that could not be attempted because there are
    /// fewer residuals than parameters: every numeric field is NaN.
    pub fn degenerate(parameter_count: usize, residual_count: usize) -> Self {
        Self {
            chi_square: f64::NAN,
            best_estimate: Array1::from_elem(parameter_count, f64::NAN),
            deviations: Array1::from_elem(parameter_count, f64::NAN),
            covariance: Array2::from_elem((parameter_count, parameter_count), f64::NAN),
            residuals: Array1::from_elem(residual_count, f64::NAN),
            termination: TerminationStatus::ImproperInput,
            ..Self::new(parameter_count, residual_count)
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.termination == TerminationStatus::ImproperInput
    }

    pub fn parameter_count(&self) -> usize {
        self.best_estimate.len()
    }

    /// Chi-square per degree of freedom, NaN without positive degrees of
    /// freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        if self.degrees_of_freedom > 0 {
            self.chi_square / self.degrees_of_freedom as f64
        } else {
            f64::NAN
        }
    }

    /// Correlation matrix of the fitted parameters.
    pub fn correlation(&self) -> Array2<f64> {
        uncertainty::correlation(&self.covariance)
    }
}

impl fmt::Display for FitResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Termination: {}", self.termination)?;
        writeln!(f, "  Chi-square: {:.6e}", self.chi_square)?;
        writeln!(f, "  Degrees of freedom: {}", self.degrees_of_freedom)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        for (i, (value, error)) in self
            .best_estimate
            .iter()
            .zip(self.deviations.iter())
            .enumerate()
        {
            writeln!(f, "  p[{}] = {:.6e} +/- {:.3e}", i, value, error)?;
        }
        Ok(())
    }
}
