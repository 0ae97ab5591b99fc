//! # Uncertainty Calculation
//!
//! Parameter covariance from the Jacobian at the solution, standard errors,
//! correlations, and linear error propagation to derived concentrations.
//! Empirical (Monte Carlo) uncertainties are produced by the orchestrator
//! instead, by re-fitting perturbed data.

mod covariance;

pub use covariance::{correlation, covariance_from_jacobian, propagate_errors, standard_errors};
