//! # Forecast Math
//!
//! Numerical building blocks for seasonal time series models.
//! This crate provides the pieces a state-space SARIMA fit is assembled from:
//! derivative-free optimisation, lag polynomial algebra, stationarity
//! transforms, small dense matrices and normal quantiles.

use thiserror::Error;

pub mod matrix;
pub mod optimization;
pub mod polynomial;
pub mod stationarity;
pub mod stats;

/// Errors that can occur in numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
