//! Forecasting models for monthly sales series

use crate::data::Metric;
use crate::error::{ForecastError, Result};
use crate::normalize::NormalizedSeries;
use chrono::NaiveDate;
use forecast_math::optimization::Termination;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod kalman;
pub mod sarima;
pub mod seasonal;

/// Raw model output for the steps after the end of the series
#[derive(Debug, Clone)]
pub struct ModelForecast {
    /// Point forecasts
    pub(crate) values: Vec<f64>,
    /// Forecast standard errors
    pub(crate) std_errors: Vec<f64>,
    /// Prediction intervals `(lower, upper)`
    pub(crate) intervals: Vec<(f64, f64)>,
}

impl ModelForecast {
    /// Create a forecast with intervals `value ± z * std_error`
    pub fn new(values: Vec<f64>, std_errors: Vec<f64>, z: f64) -> Result<Self> {
        if values.len() != std_errors.len() {
            return Err(ForecastError::DataError(format!(
                "Values length ({}) doesn't match standard errors length ({})",
                values.len(),
                std_errors.len()
            )));
        }

        let intervals = values
            .iter()
            .zip(std_errors.iter())
            .map(|(v, se)| (v - z * se, v + z * se))
            .collect();

        Ok(Self {
            values,
            std_errors,
            intervals,
        })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the forecast standard errors
    pub fn std_errors(&self) -> &[f64] {
        &self.std_errors
    }

    /// Get the prediction intervals as `(lower, upper)`
    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    /// Number of forecast steps
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// Multiply every value, error and bound by `factor`
    pub fn rescaled(self, factor: f64) -> Self {
        Self {
            values: self.values.iter().map(|v| v * factor).collect(),
            std_errors: self.std_errors.iter().map(|v| v * factor).collect(),
            intervals: self
                .intervals
                .iter()
                .map(|(lo, hi)| (lo * factor, hi * factor))
                .collect(),
        }
    }

    /// Whether every number in the forecast is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
            && self.std_errors.iter().all(|v| v.is_finite())
            && self
                .intervals
                .iter()
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite())
    }
}

/// Summary of a model fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Model description, e.g. `SARIMA(1,1,1)(1,1,1,12)`
    pub model: String,
    /// Concentrated log-likelihood on the fitting scale; absent for an exact fit
    pub log_likelihood: Option<f64>,
    /// Akaike information criterion; absent for an exact fit
    pub aic: Option<f64>,
    /// Innovation variance on the fitting scale
    pub sigma2: f64,
    /// Optimizer iterations across all runs
    pub iterations: usize,
    /// How the last optimizer run stopped; absent when no optimizer ran
    pub termination: Option<Termination>,
    /// Number of observations used
    pub n_obs: usize,
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast `horizon` steps with intervals at `confidence_level`
    fn forecast(&self, horizon: usize, confidence_level: f64) -> Result<ModelForecast>;

    /// Fit summary
    fn diagnostics(&self) -> FitDiagnostics;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a contiguous series
    fn train(&self, values: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// One forecast month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    /// Width of the prediction interval
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// Forecast for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub group_key: String,
    pub metric: Metric,
    pub points: Vec<ForecastPoint>,
    /// The normalized history the model was fitted to, in original units
    pub history: NormalizedSeries,
    pub diagnostics: FitDiagnostics,
}

impl ForecastResult {
    /// Assemble a result, checking that bounds enclose every point estimate
    pub fn new(
        group_key: impl Into<String>,
        metric: Metric,
        points: Vec<ForecastPoint>,
        history: NormalizedSeries,
        diagnostics: FitDiagnostics,
    ) -> Result<Self> {
        let group_key = group_key.into();
        for point in &points {
            if !(point.lower_bound <= point.point_estimate
                && point.point_estimate <= point.upper_bound)
            {
                return Err(ForecastError::ModelFit(format!(
                    "Group '{}': interval [{}, {}] does not contain forecast {} for {}",
                    group_key,
                    point.lower_bound,
                    point.upper_bound,
                    point.point_estimate,
                    point.period
                )));
            }
        }

        Ok(Self {
            group_key,
            metric,
            points,
            history,
            diagnostics,
        })
    }

    /// Number of forecast months
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    /// Point estimates in period order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.point_estimate).collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
