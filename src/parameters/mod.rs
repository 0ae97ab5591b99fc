//! # Parameter System
//!
//! This module describes how the unknowns of a fit reach the physical model.
//!
//! ## Core Components
//!
//! - [`FitParameterConfig`]: the ordered, named unknowns solved for by the optimizer
//! - [`ModelParameterConfig`]: per-sample declarations binding each model parameter
//!   either to a literal value or to a fit parameter
//! - [`ParameterMap`]: the resolved slot table that expands a fit vector into one
//!   model parameter vector per sample, with support for fixing fit parameters
//!
//! ## Example Usage
//!
//! ```rust
//! use gasfit_rs::parameters::{FitParameterConfig, ModelParameterConfig, ParameterMap};
//! use ndarray::array;
//!
//! let mut fit = FitParameterConfig::new();
//! fit.add_parameter("A", 0.01).unwrap();
//!
//! let samples = vec![ModelParameterConfig::new().fixed("T", 10.0).fitted("A", "A")];
//! let model_parameters = vec!["T".to_string(), "A".to_string()];
//! let map = ParameterMap::new(
//!     &model_parameters,
//!     |name| name == "T" || name == "A",
//!     &fit.name_table(),
//!     &samples,
//! )
//! .unwrap();
//!
//! let values = map.map_parameter_values(&array![0.02]).unwrap();
//! assert_eq!(values[0], array![10.0, 0.02]);
//! ```

pub mod fit;
pub mod map;
pub mod model;


// Re-export key types
pub use fit::{FitParameter, FitParameterConfig, ParameterError};
pub use map::{ParameterMap, ParameterMapError, ParameterSlot};
pub use model::{ModelParameterBinding, ModelParameterConfig};
