//! Fit function adapter.
//!
//! [`ResidualFunction`] turns a physical model, a [`ParameterMap`] and the
//! measured concentrations of the samples into a least-squares
//! [`Problem`]. It holds one independent model instance per sample, so a
//! clone of the function can be evaluated on another thread.
//!
//! Residuals are laid out sample by sample, and within a sample in gas
//! order: `r = (measured - modeled) / error`.

use ndarray::{Array1, Array2};

use crate::data::{Concentration, Gas, SampleConcentrations};
use crate::error::{GasFitError, Result};
use crate::model::PhysicalModel;
use crate::parameters::ParameterMap;
use crate::problem::{FitFunction, Problem};
use crate::results::{FitResults, ResidualTag};
use crate::uncertainty::propagate_errors;

/// Residuals and Jacobian of a multi-sample fit.
#[derive(Debug, Clone)]
pub struct ResidualFunction {
    models: Vec<Box<dyn PhysicalModel>>,
    map: ParameterMap,
    measured: Vec<SampleConcentrations>,
    /// Per sample: model-parameter position of every fit index, if used.
    fitted_indices: Vec<Vec<Option<usize>>>,
    residual_count: usize,
}

impl ResidualFunction {
    /// Create the function for `measured.len()` samples.
    ///
    /// # Errors
    ///
    /// [`GasFitError::ConfigurationMismatch`] if the number of samples does
    /// not match the parameter map, or the map was built for a model with a
    /// different number of parameters.
    pub fn new(
        model: &dyn PhysicalModel,
        map: ParameterMap,
        measured: Vec<SampleConcentrations>,
    ) -> Result<Self> {
        if measured.len() != map.sample_count() {
            return Err(GasFitError::ConfigurationMismatch(format!(
                "{} samples of data but the parameter map describes {}",
                measured.len(),
                map.sample_count()
            )));
        }
        let model_parameters = model.parameter_names().len();
        if map.sample_count() > 0 && map.slot_count() != model_parameters {
            return Err(GasFitError::ConfigurationMismatch(format!(
                "parameter map has {} slots per sample but the model takes {} parameters",
                map.slot_count(),
                model_parameters
            )));
        }

        let mut function = Self {
            models: measured.iter().map(|_| model.clone_model()).collect(),
            residual_count: measured.iter().map(|s| s.len()).sum(),
            map,
            measured,
            fitted_indices: Vec::new(),
        };
        function.setup_derivatives()?;
        Ok(function)
    }

    pub fn sample_count(&self) -> usize {
        self.measured.len()
    }

    pub fn parameter_map(&self) -> &ParameterMap {
        &self.map
    }

    pub fn measured(&self) -> &[SampleConcentrations] {
        &self.measured
    }

    /// A copy of this function fitting `measured` instead, with the same
    /// parameter map and fixation.
    pub fn with_measured(&self, measured: Vec<SampleConcentrations>) -> Result<Self> {
        if measured.len() != self.measured.len() {
            return Err(GasFitError::ConfigurationMismatch(format!(
                "{} samples of data for a function over {} samples",
                measured.len(),
                self.measured.len()
            )));
        }
        let mut function = self.clone();
        function.residual_count = measured.iter().map(|s| s.len()).sum();
        function.measured = measured;
        Ok(function)
    }

    /// Map the fit vector and push one parameter vector into every model.
    pub fn set_parameters(&mut self, fit_values: &Array1<f64>) -> Result<()> {
        let expected = self.map.fitted_parameter_count();
        if fit_values.len() != expected {
            return Err(GasFitError::DimensionMismatch(format!(
                "Expected {} fit parameters, got {}",
                expected,
                fit_values.len()
            )));
        }

        let values = self.map.map_parameter_values(fit_values)?;
        for (model, sample_values) in self.models.iter_mut().zip(values.iter()) {
            model.set_parameters(sample_values)?;
        }
        Ok(())
    }

    /// Residuals for the parameters last passed to
    /// [`set_parameters`](Self::set_parameters).
    pub fn calc_residuals(&self) -> Result<Array1<f64>> {
        let mut residuals = Array1::zeros(self.residual_count);
        let mut row = 0;
        for (model, measured) in self.models.iter().zip(self.measured.iter()) {
            for (gas, concentration) in measured {
                let modeled = model.concentration(*gas)?;
                residuals[row] = (concentration.value - modeled) / concentration.error;
                row += 1;
            }
        }
        Ok(residuals)
    }

    /// Jacobian of [`calc_residuals`](Self::calc_residuals) with respect to
    /// the free fit parameters.
    ///
    /// A fit parameter a sample does not use has a zero derivative in all of
    /// that sample's rows.
    pub fn calc_jacobian(&self) -> Result<Array2<f64>> {
        let mut jacobian = Array2::zeros((self.residual_count, self.map.fitted_parameter_count()));
        let mut row = 0;
        for (sample, measured) in self.measured.iter().enumerate() {
            for (gas, concentration) in measured {
                let derivatives = self.model_derivatives(sample, *gas, false)?;
                for (fit_index, derivative) in derivatives.iter().enumerate() {
                    jacobian[[row, fit_index]] = -derivative / concentration.error;
                }
                row += 1;
            }
        }
        Ok(jacobian)
    }

    /// Fix fit parameters (original indices) to values.
    ///
    /// Successive calls are relative to the original mapping, not
    /// cumulative.
    pub fn fix_parameters(&mut self, fixes: &[(usize, f64)]) -> Result<()> {
        self.map.fix_parameters(fixes)?;
        self.setup_derivatives()
    }

    /// Release every fixed parameter.
    pub fn reset_parameters(&mut self) -> Result<()> {
        self.map.reset_parameters();
        self.setup_derivatives()
    }

    /// The `(sample, gas)` pair every residual row belongs to.
    pub fn residual_tags(&self) -> Vec<ResidualTag> {
        self.measured
            .iter()
            .enumerate()
            .flat_map(|(sample, measured)| {
                measured.keys().map(move |gas| ResidualTag { sample, gas: *gas })
            })
            .collect()
    }

    fn setup_derivatives(&mut self) -> Result<()> {
        self.fitted_indices = (0..self.models.len())
            .map(|sample| self.map.fitted_parameter_indices(sample))
            .collect::<std::result::Result<_, _>>()?;
        for (model, indices) in self.models.iter_mut().zip(self.fitted_indices.iter()) {
            model.setup_derivatives(indices);
        }
        Ok(())
    }

    /// Derivatives of the (equilibrium) concentration of `gas` in `sample`
    /// with respect to every free fit parameter.
    fn model_derivatives(
        &self,
        sample: usize,
        gas: Gas,
        equilibrium: bool,
    ) -> Result<Array1<f64>> {
        let model = &self.models[sample];
        let row = if equilibrium {
            model.equilibrium_derivatives(gas)?
        } else {
            model.derivatives(gas)?
        };
        if row.len() != self.map.slot_count() {
            return Err(GasFitError::DimensionMismatch(format!(
                "model returned {} derivatives for {}, expected {}",
                row.len(),
                gas,
                self.map.slot_count()
            )));
        }

        let mut derivatives = Array1::zeros(self.map.fitted_parameter_count());
        for (fit_index, position) in self.fitted_indices[sample].iter().enumerate() {
            if let Some(position) = position {
                derivatives[fit_index] = row[*position];
            }
        }
        Ok(derivatives)
    }

    /// Modeled concentrations of one sample with errors propagated from
    /// `covariance`.
    fn compile_sample(
        &self,
        sample: usize,
        covariance: &Array2<f64>,
        equilibrium: bool,
    ) -> Result<SampleConcentrations> {
        let gases: Vec<Gas> = self.measured[sample].keys().copied().collect();
        let mut jacobian = Array2::zeros((gases.len(), covariance.nrows()));
        let mut values = Vec::with_capacity(gases.len());

        for (row, gas) in gases.iter().enumerate() {
            let model = &self.models[sample];
            values.push(if equilibrium {
                model.equilibrium_concentration(*gas)?
            } else {
                model.concentration(*gas)?
            });
            jacobian
                .row_mut(row)
                .assign(&self.model_derivatives(sample, *gas, equilibrium)?);
        }

        let errors = propagate_errors(&jacobian, covariance)?;
        Ok(gases
            .into_iter()
            .zip(values)
            .zip(errors.iter())
            .map(|((gas, value), error)| (gas, Concentration::new(value, *error)))
            .collect())
    }
}

impl Problem for ResidualFunction {
    fn eval(&mut self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.set_parameters(params)?;
        self.calc_residuals()
    }

    fn parameter_count(&self) -> usize {
        self.map.fitted_parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.residual_count
    }

    fn jacobian(&mut self, params: &Array1<f64>) -> Result<Array2<f64>> {
        self.set_parameters(params)?;
        self.calc_jacobian()
    }
}

impl FitFunction for ResidualFunction {
    fn compile_results(&mut self, results: &mut FitResults) -> Result<()> {
        results.residual_tags = self.residual_tags();
        results.measured_concentrations = self.measured.clone();

        if results.best_estimate.iter().any(|v| v.is_nan()) {
            let undefined = |measured: &SampleConcentrations| -> SampleConcentrations {
                measured
                    .keys()
                    .map(|gas| (*gas, Concentration::new(f64::NAN, f64::NAN)))
                    .collect()
            };
            results.model_concentrations = self.measured.iter().map(undefined).collect();
            results.equilibrium_concentrations = self.measured.iter().map(undefined).collect();
            return Ok(());
        }

        let p = self.map.fitted_parameter_count();
        if results.covariance.shape() != [p, p] {
            return Err(GasFitError::DimensionMismatch(format!(
                "expected a {}x{} covariance, got {:?}",
                p,
                p,
                results.covariance.shape()
            )));
        }

        self.set_parameters(&results.best_estimate)?;
        let mut model = Vec::with_capacity(self.measured.len());
        let mut equilibrium = Vec::with_capacity(self.measured.len());
        for sample in 0..self.measured.len() {
            model.push(self.compile_sample(sample, &results.covariance, false)?);
            equilibrium.push(self.compile_sample(sample, &results.covariance, true)?);
        }
        results.model_concentrations = model;
        results.equilibrium_concentrations = equilibrium;
        Ok(())
    }
}
