//! Error types for the sales_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A group has no usable observations, or too few to fit
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The seasonal model could not be fitted or produced invalid output
    #[error("Model fit failed: {0}")]
    ModelFit(String),

    /// Invalid run configuration or input schema; fatal for the whole run
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from numerical routines
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// The worker pool could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
