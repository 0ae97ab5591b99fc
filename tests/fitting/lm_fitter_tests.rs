//! Tests for the Levenberg-Marquardt fitter on residual functions

use approx::assert_relative_eq;
use gasfit_rs::data::Gas;
use gasfit_rs::parameters::{FitParameterConfig, ModelParameterConfig, ParameterMap};
use gasfit_rs::{LmConfig, LmFitter, ResidualFunction, TerminationStatus};
use ndarray::{array, Array1};

use crate::common::{excess_air_model, synthetic_sample};

fn single_sample_function(
    declaration: ModelParameterConfig,
    fit: &FitParameterConfig,
) -> ResidualFunction {
    let model = excess_air_model();
    let map = ParameterMap::for_model(&model, fit, &[declaration]).unwrap();
    let measured = vec![synthetic_sample("s", 1.1, 0.3).concentrations];
    ResidualFunction::new(&model, map, measured).unwrap()
}

#[test]
fn test_fit_recovers_generating_parameters() {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("Ceq", 0.5).unwrap();
    fit.add_parameter("A", 0.0).unwrap();
    let mut function = single_sample_function(
        ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A"),
        &fit,
    );

    let results = LmFitter::default().fit(&mut function, fit.initial_values()).unwrap();

    assert!(results.termination.is_converged(), "{}", results);
    assert_relative_eq!(results.best_estimate[0], 1.1, epsilon = 1e-8);
    assert_relative_eq!(results.best_estimate[1], 0.3, epsilon = 1e-8);
    assert_eq!(results.degrees_of_freedom, 1);
    assert!(results.chi_square < 1e-12);
    assert!(results.deviations.iter().all(|d| d.is_finite() && *d > 0.0));

    // Derived fields are present and consistent with the estimate.
    let ne = results.model_concentrations[0][&Gas::Ne];
    assert_relative_eq!(ne.value, 2.0 * 1.1 + 1.5 * 0.3, epsilon = 1e-8);
    assert!(ne.error > 0.0);
    let ne_eq = results.equilibrium_concentrations[0][&Gas::Ne];
    assert_relative_eq!(ne_eq.value, 2.2, epsilon = 1e-8);
    assert_eq!(results.residual_tags.len(), 3);
    assert_eq!(results.measured_concentrations.len(), 1);
}

#[test]
fn test_under_determined_fit() {
    // A single measured gas cannot determine two parameters.
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("Ceq", 1.0).unwrap();
    fit.add_parameter("A", 0.0).unwrap();
    let model = excess_air_model();
    let map = ParameterMap::for_model(
        &model,
        &fit,
        &[ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A")],
    )
    .unwrap();
    let mut measured = synthetic_sample("s", 1.0, 0.0).concentrations;
    measured.retain(|gas, _| *gas == Gas::Ne);
    let mut function = ResidualFunction::new(&model, map, vec![measured]).unwrap();

    let results = LmFitter::default().fit(&mut function, fit.initial_values()).unwrap();

    assert_eq!(results.termination, TerminationStatus::ImproperInput);
    assert_eq!(results.degrees_of_freedom, -1);
    assert_eq!(results.iterations, 0);
    assert!(results.chi_square.is_nan());
    assert!(results.best_estimate.iter().all(|v| v.is_nan()));
    assert!(results.covariance.iter().all(|v| v.is_nan()));
    assert!(results.model_concentrations[0][&Gas::Ne].value.is_nan());
}

#[test]
fn test_fit_with_everything_fixed() {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("Ceq", 1.0).unwrap();
    let mut function = single_sample_function(
        ModelParameterConfig::new().fitted("Ceq", "Ceq").fixed("A", 0.3),
        &fit,
    );
    function.fix_parameters(&[(0, 1.0)]).unwrap();

    let results = LmFitter::default().fit(&mut function, Array1::zeros(0)).unwrap();

    assert_eq!(results.covariance.shape(), &[0, 0]);
    assert_eq!(results.termination, TerminationStatus::NotStarted);
    let mut direct = function.clone();
    let expected = gasfit_rs::Problem::eval(&mut direct, &Array1::zeros(0)).unwrap();
    assert_eq!(results.residuals, expected);
    assert_relative_eq!(results.chi_square, expected.iter().map(|r| r * r).sum::<f64>());
    assert_eq!(results.model_concentrations[0][&Gas::Ar].error, 0.0);
}

#[test]
fn test_fixing_changes_degrees_of_freedom() {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("Ceq", 0.5).unwrap();
    fit.add_parameter("A", 0.0).unwrap();
    let mut function = single_sample_function(
        ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A"),
        &fit,
    );
    function.fix_parameters(&[(1, 0.3)]).unwrap();

    let fitter = LmFitter::new(LmConfig::default().with_max_iterations(50));
    let results = fitter.fit(&mut function, array![0.5]).unwrap();
    assert_eq!(results.degrees_of_freedom, 2);
    assert_relative_eq!(results.best_estimate[0], 1.1, epsilon = 1e-8);
}

#[test]
fn test_unbound_parameter_has_unbounded_deviation() {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("Ceq", 0.5).unwrap();
    fit.add_parameter("A", 0.0).unwrap();
    // Declared, but no sample binds it.
    fit.add_parameter("B", 3.0).unwrap();
    let mut function = single_sample_function(
        ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A"),
        &fit,
    );

    let results = LmFitter::default()
        .fit(&mut function, fit.initial_values())
        .unwrap();

    assert_relative_eq!(results.best_estimate[0], 1.1, epsilon = 1e-8);
    assert_relative_eq!(results.best_estimate[1], 0.3, epsilon = 1e-8);
    assert_relative_eq!(results.best_estimate[2], 3.0, epsilon = 1e-12);
    assert!(results.deviations[0].is_finite() && results.deviations[0] > 0.0);
    assert!(results.deviations[1].is_finite() && results.deviations[1] > 0.0);
    assert_eq!(results.deviations[2], f64::INFINITY);
    assert!(results.covariance[[0, 2]].is_nan());

    // Concentrations do not depend on B and keep finite errors.
    for concentration in results.model_concentrations[0].values() {
        assert!(concentration.error.is_finite());
    }
}
