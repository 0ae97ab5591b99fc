//! Built-in physical model implementations.
//!
//! Concrete dissolved-gas models (solubility equations, excess-air
//! variants) are supplied by the application through the
//! [`PhysicalModel`](crate::model::PhysicalModel) trait. This module holds
//! the linear model used for mixing problems and for exercising the fitting
//! machinery.

mod linear;

pub use linear::LinearGasModel;
