//! Run configuration
//!
//! One [`ForecastConfig`] applies to every group in a run. It is validated
//! once, before any group is processed; a failure is a
//! [`ForecastError::Configuration`] and aborts the run.

use crate::data::Metric;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Non-seasonal ARIMA order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ModelOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for ModelOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// Seasonal order `(P, D, Q, s)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// Whether any seasonal term is active
    pub fn is_seasonal(&self) -> bool {
        self.p + self.d + self.q > 0
    }
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self::new(1, 1, 1, 12)
    }
}

/// Settings shared by every group in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future months to forecast
    pub horizon: usize,
    /// Non-seasonal order
    pub order: ModelOrder,
    /// Seasonal order
    pub seasonal_order: SeasonalOrder,
    /// Coverage of the prediction intervals
    pub confidence_level: f64,
    /// Divisor applied to the metric before fitting; `None` uses the metric's default
    pub scale_factor: Option<f64>,
    /// Shortest normalized history that is fitted; `None` means two seasonal cycles
    pub min_observations: Option<usize>,
    /// Iteration budget for each optimizer run
    pub max_iterations: usize,
    /// Wall-clock budget for a single group fit, in seconds
    pub fit_timeout_secs: Option<f64>,
    /// Worker threads; `None` uses every available CPU
    pub max_workers: Option<usize>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            order: ModelOrder::default(),
            seasonal_order: SeasonalOrder::default(),
            confidence_level: 0.95,
            scale_factor: None,
            min_observations: None,
            max_iterations: 5000,
            fit_timeout_secs: None,
            max_workers: None,
        }
    }
}

impl ForecastConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: ForecastConfig = serde_json::from_str(&text)
            .map_err(|e| ForecastError::Configuration(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field; the first problem found is reported.
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ForecastError::Configuration(
                "horizon must be a positive number of months".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::Configuration(format!(
                "confidence_level must be between 0 and 1, got {}",
                self.confidence_level
            )));
        }
        if let Some(scale) = self.scale_factor {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ForecastError::Configuration(format!(
                    "scale_factor must be a positive finite number, got {}",
                    scale
                )));
            }
        }
        if self.seasonal_order.is_seasonal() && self.seasonal_order.period < 2 {
            return Err(ForecastError::Configuration(format!(
                "seasonal period must be at least 2 when seasonal terms are set, got {}",
                self.seasonal_order.period
            )));
        }
        if self.min_observations == Some(0) {
            return Err(ForecastError::Configuration(
                "min_observations must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ForecastError::Configuration(
                "max_iterations must be positive".to_string(),
            ));
        }
        if let Some(secs) = self.fit_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ForecastError::Configuration(format!(
                    "fit_timeout_secs must be a positive number of seconds a timer can hold, got {}",
                    secs
                )));
            }
        }
        if self.max_workers == Some(0) {
            return Err(ForecastError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Divisor used for `metric` during fitting
    pub fn scale_factor_for(&self, metric: Metric) -> f64 {
        self.scale_factor.unwrap_or_else(|| metric.default_scale())
    }

    /// Shortest series that is handed to the model
    pub fn min_observations(&self) -> usize {
        self.min_observations
            .unwrap_or_else(|| (2 * self.seasonal_order.period).max(2))
    }

    /// Per-group fit time budget; unrepresentable values mean no budget
    pub fn fit_timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
