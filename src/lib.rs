//! # gasfit-rs
//!
//! `gasfit-rs` fits parametric models of dissolved-gas concentrations to
//! measured water samples by nonlinear least squares, and estimates parameter
//! uncertainties from Monte Carlo re-fits of perturbed data.
//!
//! The library provides:
//! - A mapping from shared fit parameters to per-sample model parameters,
//!   with fixing and releasing of individual fit parameters
//! - A residual/Jacobian adapter over any [`PhysicalModel`]
//! - A Levenberg-Marquardt fitter producing [`FitResults`] with covariance
//!   and propagated concentration errors
//! - A two-phase parallel orchestrator: plain fits, then Monte Carlo re-fits
//!   delivered in submission order
//!
//! ## Basic Usage
//!
//! ```
//! use gasfit_rs::data::{ConcentrationDataset, Gas, Sample};
//! use gasfit_rs::models::LinearGasModel;
//! use gasfit_rs::orchestrator::{FitRecord, ResultSink};
//! use gasfit_rs::parameters::{FitParameterConfig, ModelParameterConfig};
//! use gasfit_rs::{DefaultFitter, FitConfiguration, FitterConfig, Result};
//!
//! struct Print;
//!
//! impl ResultSink for Print {
//!     fn process_result(&mut self, record: &FitRecord<'_>) -> Result<()> {
//!         println!("{:?} = {}", record.parameter_names, record.results.best_estimate);
//!         Ok(())
//!     }
//!
//!     fn process_monte_carlo_result(&mut self, _record: &FitRecord<'_>) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let dataset = ConcentrationDataset::from_samples(vec![Sample::new("well 1")
//!     .with_concentration(Gas::Ne, 2.1, 0.05)
//!     .with_concentration(Gas::Ar, 3.2, 0.05)]);
//!
//! let model = LinearGasModel::new(&["Ceq", "A"])
//!     .with_gas(Gas::Ne, &[1.0, 1.0])?
//!     .with_gas(Gas::Ar, &[1.5, 0.2])?;
//!
//! let mut fit = FitParameterConfig::new();
//! fit.add_parameter("Ceq", 1.0)?;
//! fit.add_parameter("A", 0.0)?;
//!
//! let configuration = FitConfiguration::new(
//!     Box::new(model),
//!     fit,
//!     vec![ModelParameterConfig::new().fitted("Ceq", "Ceq").fitted("A", "A")],
//!     vec![0],
//! )?
//! .with_monte_carlo_repetitions(10);
//!
//! let fitter = DefaultFitter::new(dataset, vec![configuration])?
//!     .with_config(FitterConfig::new().with_random_seed(1));
//! let summary = fitter.fit(&mut Print)?;
//! assert_eq!(summary.monte_carlo_fits, 10);
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod config;
pub mod data;
pub mod error;
pub mod fit_configuration;
pub mod fitter;
pub mod lm;
pub mod model;
pub mod models;
pub mod monte_carlo;
pub mod orchestrator;
pub mod parameters;
pub mod problem;
pub mod random;
pub mod residual;
pub mod results;
pub mod uncertainty;

mod utils;

// Re-exports for convenience
pub use config::FitterConfig;
pub use error::{GasFitError, Result};
pub use fit_configuration::FitConfiguration;
pub use fitter::LmFitter;
pub use lm::{LevenbergMarquardt, LmConfig, TerminationStatus};
pub use model::PhysicalModel;
pub use monte_carlo::MonteCarloController;
pub use orchestrator::{CancellationToken, DefaultFitter, FitSummary, ResultSink};
pub use parameters::{FitParameterConfig, ModelParameterConfig, ParameterMap};
pub use problem::{FitFunction, Problem};
pub use residual::ResidualFunction;
pub use results::FitResults;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
