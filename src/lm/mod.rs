//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the nonlinear least-squares solver the fitter drives.
//! It only sees a [`Problem`](crate::problem::Problem): a residual vector and
//! its Jacobian as functions of the parameter vector.

pub mod algorithm;
pub mod config;
pub mod status;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use status::TerminationStatus;
