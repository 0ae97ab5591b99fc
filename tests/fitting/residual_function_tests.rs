//! Tests for the residual function over physical models

use approx::assert_relative_eq;
use gasfit_rs::data::{Concentration, Gas, SampleConcentrations};
use gasfit_rs::model::PhysicalModel;
use gasfit_rs::parameters::{FitParameterConfig, ModelParameterConfig, ParameterMap};
use gasfit_rs::{GasFitError, Problem, ResidualFunction, Result};
use ndarray::{array, Array1};
use std::sync::{Arc, Mutex};

use crate::common::{excess_air_model, synthetic_sample};

/// Wraps a model and records the wiring passed to `setup_derivatives`.
#[derive(Debug, Clone)]
struct Recording {
    inner: gasfit_rs::models::LinearGasModel,
    wiring: Arc<Mutex<Vec<Vec<Option<usize>>>>>,
}

impl PhysicalModel for Recording {
    fn clone_model(&self) -> Box<dyn PhysicalModel> {
        Box::new(self.clone())
    }

    fn parameter_names(&self) -> &[String] {
        self.inner.parameter_names()
    }

    fn set_parameters(&mut self, parameters: &Array1<f64>) -> Result<()> {
        self.inner.set_parameters(parameters)
    }

    fn concentration(&self, gas: Gas) -> Result<f64> {
        self.inner.concentration(gas)
    }

    fn equilibrium_concentration(&self, gas: Gas) -> Result<f64> {
        self.inner.equilibrium_concentration(gas)
    }

    fn derivatives(&self, gas: Gas) -> Result<Array1<f64>> {
        self.inner.derivatives(gas)
    }

    fn equilibrium_derivatives(&self, gas: Gas) -> Result<Array1<f64>> {
        self.inner.equilibrium_derivatives(gas)
    }

    fn setup_derivatives(&mut self, fitted_indices: &[Option<usize>]) {
        self.wiring.lock().unwrap().push(fitted_indices.to_vec());
    }
}

type Setup = (FitParameterConfig, Vec<ModelParameterConfig>, Vec<SampleConcentrations>);

fn two_sample_setup() -> Setup {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("C1", 1.0).unwrap();
    fit.add_parameter("C2", 1.0).unwrap();
    fit.add_parameter("A", 0.0).unwrap();
    let declarations = vec![
        ModelParameterConfig::new().fitted("Ceq", "C1").fitted("A", "A"),
        ModelParameterConfig::new().fitted("Ceq", "C2").fixed("A", 0.0),
    ];
    let measured = vec![
        synthetic_sample("a", 1.0, 0.2).concentrations,
        synthetic_sample("b", 1.2, 0.0).concentrations,
    ];
    (fit, declarations, measured)
}

#[test]
fn test_setup_derivatives_follows_fixing() {
    let wiring = Arc::new(Mutex::new(Vec::new()));
    let model = Recording {
        inner: excess_air_model(),
        wiring: Arc::clone(&wiring),
    };
    let (fit, declarations, measured) = two_sample_setup();
    let map = ParameterMap::for_model(&model, &fit, &declarations).unwrap();
    let mut function = ResidualFunction::new(&model, map, measured).unwrap();

    assert_eq!(
        *wiring.lock().unwrap(),
        vec![vec![Some(0), None, Some(1)], vec![None, Some(0), None]]
    );

    wiring.lock().unwrap().clear();
    function.fix_parameters(&[(0, 1.0)]).unwrap();
    assert_eq!(
        *wiring.lock().unwrap(),
        vec![vec![None, Some(1)], vec![Some(0), None]]
    );

    wiring.lock().unwrap().clear();
    function.reset_parameters().unwrap();
    assert_eq!(wiring.lock().unwrap().len(), 2);
}

#[test]
fn test_residuals_vanish_at_true_parameters() {
    let model = excess_air_model();
    let (fit, declarations, measured) = two_sample_setup();
    let map = ParameterMap::for_model(&model, &fit, &declarations).unwrap();
    let mut function = ResidualFunction::new(&model, map, measured).unwrap();

    let residuals = function.eval(&array![1.0, 1.2, 0.2]).unwrap();
    assert_eq!(residuals.len(), 6);
    for r in residuals.iter() {
        assert_relative_eq!(*r, 0.0, epsilon = 1e-12);
    }

    let jacobian = function.jacobian(&array![1.0, 1.2, 0.2]).unwrap();
    // Sample "b" has A fixed: no derivative with respect to A.
    for row in 3..6 {
        assert_eq!(jacobian[[row, 2]], 0.0);
        assert_eq!(jacobian[[row, 0]], 0.0);
    }
}

#[test]
fn test_unknown_gas_is_an_evaluation_error() {
    let model = excess_air_model();
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("C", 1.0).unwrap();
    let declarations = vec![ModelParameterConfig::new().fitted("Ceq", "C").fixed("A", 0.0)];
    let map = ParameterMap::for_model(&model, &fit, &declarations).unwrap();
    let measured: SampleConcentrations = [(Gas::Xe, Concentration::new(1.0, 0.1))]
        .into_iter()
        .collect();

    let mut function = ResidualFunction::new(&model, map, vec![measured]).unwrap();
    assert!(matches!(
        function.eval(&array![1.0]),
        Err(GasFitError::FunctionEvaluation(_))
    ));
}
