use thiserror::Error;

use crate::parameters::{ParameterError, ParameterMapError};

/// Error types for the gasfit-rs library.
#[derive(Error, Debug)]
pub enum GasFitError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The pieces of a fit configuration do not fit together
    /// (e.g. sample count of the data vs. the parameter map).
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// Invalid orchestrator or configuration input.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error in the fit parameter configuration.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Error while building or mutating a parameter map.
    #[error("Parameter map error: {0}")]
    ParameterMap(#[from] ParameterMapError),

    /// Error raised by a physical model while evaluating concentrations.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// The worker thread pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A Monte Carlo job was dropped by its worker without being completed.
    #[error("Monte Carlo job for configuration {configuration} was abandoned")]
    JobAbandoned { configuration: usize },

    /// Error reported by a result sink.
    #[error("Result sink error: {0}")]
    Sink(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for gasfit-rs operations.
pub type Result<T> = std::result::Result<T, GasFitError>;
