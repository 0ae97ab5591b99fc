//! End-to-end tests of the two-phase fitter

use std::sync::Arc;

use approx::assert_relative_eq;
use gasfit_rs::data::{ConcentrationDataset, Gas, Sample};
use gasfit_rs::models::LinearGasModel;
use gasfit_rs::orchestrator::{FitRecord, ResultSink};
use gasfit_rs::parameters::{FitParameterConfig, ModelParameterConfig};
use gasfit_rs::{DefaultFitter, FitConfiguration, FitterConfig, GasFitError, Result};

use crate::common::{excess_air_model, synthetic_dataset, ChaChaSource, CollectingSink, ZeroSource};

/// One configuration per well: Ceq and A free.
fn per_well_configurations(repetitions: usize) -> Vec<FitConfiguration> {
    (0..3)
        .map(|well| {
            let mut fit = FitParameterConfig::new();
            fit.add_parameter("Ceq", 1.0).unwrap();
            fit.add_parameter("A", 0.0).unwrap();
            FitConfiguration::new(
                Box::new(excess_air_model()),
                fit,
                vec![ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A")],
                vec![well],
            )
            .unwrap()
            .with_monte_carlo_repetitions(repetitions)
        })
        .collect()
}

/// All three wells in one configuration: per-well Ceq, shared A.
fn joint_configuration() -> FitConfiguration {
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("A", 0.0).unwrap();
    for well in 1..=3 {
        fit.add_parameter(&format!("Ceq{}", well), 1.0).unwrap();
    }
    let declarations = (1..=3)
        .map(|well| {
            ModelParameterConfig::new()
                .fitted("Ceq", &format!("Ceq{}", well))
                .fitted("A", "A")
        })
        .collect();
    FitConfiguration::new(Box::new(excess_air_model()), fit, declarations, vec![0, 1, 2]).unwrap()
}

#[test]
fn test_two_samples_sharing_a_parameter() {
    let dataset = ConcentrationDataset::from_samples(vec![
        Sample::new("a").with_concentration(Gas::Ne, 2.0, 0.1),
        Sample::new("b").with_concentration(Gas::Ne, 2.2, 0.1),
    ]);
    let model = LinearGasModel::new(&["C"]).with_gas(Gas::Ne, &[1.0]).unwrap();
    let mut fit = FitParameterConfig::new();
    fit.add_parameter("C", 1.0).unwrap();
    let shared = |_| ModelParameterConfig::new().fitted("C", "C");
    let configurations = vec![
        FitConfiguration::new(
            Box::new(model.clone()),
            fit.clone(),
            (0..2).map(shared).collect(),
            vec![0, 1],
        )
        .unwrap(),
        FitConfiguration::new(Box::new(model), fit, vec![shared(0)], vec![1]).unwrap(),
    ];

    let mut sink = CollectingSink::default();
    let summary = DefaultFitter::new(dataset, configurations)
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(3))
        .fit(&mut sink)
        .unwrap();

    assert_eq!(summary.plain_fits, 2);
    assert_eq!(summary.monte_carlo_fits, 0);
    assert!(sink.monte_carlo.is_empty());
    assert_eq!(
        sink.plain.iter().map(|r| r.configuration).collect::<Vec<_>>(),
        vec![0, 1]
    );

    let joint = &sink.plain[0];
    assert_relative_eq!(joint.results.best_estimate[0], 2.1, epsilon = 1e-8);
    assert_eq!(joint.results.degrees_of_freedom, 1);
    assert_eq!(joint.sample_names, vec!["a".to_string(), "b".to_string()]);
    assert_relative_eq!(sink.plain[1].results.best_estimate[0], 2.2, epsilon = 1e-8);
}

#[test]
fn test_per_well_fits_recover_parameters() {
    let mut sink = CollectingSink::default();
    DefaultFitter::new(synthetic_dataset(), per_well_configurations(0))
        .unwrap()
        .fit(&mut sink)
        .unwrap();

    let expected = [(1.0, 0.2), (1.2, 0.4), (0.9, 0.1)];
    for (record, (ceq, a)) in sink.plain.iter().zip(expected) {
        assert_relative_eq!(record.results.best_estimate[0], ceq, epsilon = 1e-8);
        assert_relative_eq!(record.results.best_estimate[1], a, epsilon = 1e-8);
        assert_eq!(record.parameter_names, vec!["Ceq".to_string(), "A".to_string()]);
    }
    assert_eq!(sink.plain[1].sample_names, vec!["well 2".to_string()]);
}

#[test]
fn test_joint_fit_with_fixed_parameter() {
    let mut configuration = joint_configuration();
    configuration.fix_parameter("Ceq2", 1.2).unwrap();

    let mut sink = CollectingSink::default();
    DefaultFitter::new(synthetic_dataset(), vec![configuration])
        .unwrap()
        .fit(&mut sink)
        .unwrap();

    let record = &sink.plain[0];
    assert_eq!(
        record.parameter_names,
        vec!["A".to_string(), "Ceq1".to_string(), "Ceq3".to_string()]
    );
    assert_eq!(record.sample_names.len(), 3);
    assert_eq!(record.results.best_estimate.len(), 3);
    assert_eq!(record.results.degrees_of_freedom, 9 - 3);
    // The shared A cannot match all wells; Ceq2 stays at its fixed value.
    let well2 = &record.results.equilibrium_concentrations[1][&Gas::Ne];
    assert_relative_eq!(well2.value, 2.4, epsilon = 1e-10);
    assert_eq!(well2.error, 0.0);
}

#[test]
fn test_unperturbed_monte_carlo_matches_plain_fit() {
    let mut sink = CollectingSink::default();
    let summary = DefaultFitter::new(synthetic_dataset(), per_well_configurations(5))
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(4))
        .with_random_source(Arc::new(ZeroSource))
        .fit(&mut sink)
        .unwrap();

    assert_eq!(summary.monte_carlo_fits, 15);
    assert_eq!(
        sink.monte_carlo.iter().map(|r| r.configuration).collect::<Vec<_>>(),
        vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2]
    );
    for record in &sink.monte_carlo {
        let plain = &sink.plain[record.configuration];
        let estimates = record.results.best_estimate.iter();
        for (mc, fit) in estimates.zip(plain.results.best_estimate.iter()) {
            assert_relative_eq!(*mc, *fit, epsilon = 1e-12);
        }
        assert_eq!(record.concentrations, plain.concentrations);
    }
}

#[test]
fn test_seeded_monte_carlo_is_reproducible() {
    let run = |seed: u64| {
        let mut sink = CollectingSink::default();
        DefaultFitter::new(synthetic_dataset(), per_well_configurations(4))
            .unwrap()
            .with_config(FitterConfig::new().with_worker_threads(1))
            .with_random_source(Arc::new(ChaChaSource::new(seed)))
            .fit(&mut sink)
            .unwrap();
        sink.monte_carlo
            .into_iter()
            .map(|r| r.results.best_estimate.to_vec())
            .collect::<Vec<_>>()
    };

    let first = run(11);
    assert_eq!(first.len(), 12);
    assert_eq!(first, run(11));
    assert_ne!(first, run(12));
}

#[test]
fn test_perturbed_data_reaches_the_sink() {
    let mut sink = CollectingSink::default();
    DefaultFitter::new(synthetic_dataset(), per_well_configurations(2))
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(2).with_random_seed(3))
        .fit(&mut sink)
        .unwrap();

    for record in &sink.monte_carlo {
        let plain = &sink.plain[record.configuration];
        assert_ne!(record.concentrations, plain.concentrations);
        for (gas, perturbed) in &record.concentrations[0] {
            let original = plain.concentrations[0][gas];
            assert_eq!(perturbed.error, original.error);
        }
    }
}

#[test]
fn test_sink_error_stops_the_run() {
    let mut sink = CollectingSink {
        fail_monte_carlo_at: Some(2),
        ..CollectingSink::default()
    };
    let result = DefaultFitter::new(synthetic_dataset(), per_well_configurations(50))
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(4).with_random_seed(1))
        .fit(&mut sink);

    assert!(matches!(result, Err(GasFitError::Sink(_))));
    assert_eq!(sink.plain.len(), 3);
    assert_eq!(sink.monte_carlo.len(), 2);
}

/// Cancels the run from inside the sink after a number of Monte Carlo results.
struct CancelAfter {
    token: gasfit_rs::CancellationToken,
    remaining: usize,
    received: usize,
}

impl ResultSink for CancelAfter {
    fn process_result(&mut self, _record: &FitRecord<'_>) -> Result<()> {
        Ok(())
    }

    fn process_monte_carlo_result(&mut self, _record: &FitRecord<'_>) -> Result<()> {
        self.received += 1;
        if self.received == self.remaining {
            self.token.cancel();
        }
        Ok(())
    }
}

#[test]
fn test_cancellation_during_monte_carlo() {
    let fitter = DefaultFitter::new(synthetic_dataset(), per_well_configurations(200))
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(2).with_random_seed(9));
    let mut sink = CancelAfter {
        token: fitter.cancellation_token(),
        remaining: 5,
        received: 0,
    };

    let summary = fitter.fit(&mut sink).unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.plain_fits, 3);
    assert!(summary.monte_carlo_fits >= 5);
    assert!(summary.monte_carlo_fits < 600);
    assert_eq!(summary.monte_carlo_fits, sink.received);
}

#[test]
fn test_empty_configuration_list() {
    let mut sink = CollectingSink::default();
    let summary = DefaultFitter::new(synthetic_dataset(), Vec::new())
        .unwrap()
        .fit(&mut sink)
        .unwrap();
    assert_eq!(summary.plain_fits, 0);
    assert!(!summary.interrupted);
}

#[test]
fn test_disabled_well_is_not_fitted() {
    let mut dataset = synthetic_dataset();
    dataset.set_enabled(1, false).unwrap();

    let result = DefaultFitter::new(dataset.clone(), per_well_configurations(0));
    assert!(matches!(result, Err(GasFitError::InvalidConfiguration(_))));

    // Dropping the configuration for well 2 leaves a valid run.
    let configurations: Vec<_> = per_well_configurations(2)
        .into_iter()
        .enumerate()
        .filter(|(well, _)| *well != 1)
        .map(|(_, configuration)| configuration)
        .collect();
    let mut sink = CollectingSink::default();
    let summary = DefaultFitter::new(dataset, configurations)
        .unwrap()
        .with_config(FitterConfig::new().with_worker_threads(2).with_random_seed(4))
        .fit(&mut sink)
        .unwrap();

    assert_eq!(summary.plain_fits, 2);
    assert_eq!(summary.monte_carlo_fits, 4);
    let fitted: Vec<&str> = sink
        .plain
        .iter()
        .chain(sink.monte_carlo.iter())
        .flat_map(|record| record.sample_names.iter().map(String::as_str))
        .collect();
    assert!(!fitted.contains(&"well 2"));
}
