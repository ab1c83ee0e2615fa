//! Group-level seasonal forecasting
//!
//! Wraps [`SarimaModel`] with the run settings: rescaling into the fitting
//! range and back, and dating the forecast steps.

use crate::config::ForecastConfig;
use crate::data::Metric;
use crate::error::Result;
use crate::models::sarima::SarimaModel;
use crate::models::{ForecastModel, ForecastPoint, ForecastResult, TrainedForecastModel};
use crate::normalize::NormalizedSeries;

/// Fits and forecasts one normalized series with the run's settings
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    model: SarimaModel,
    metric: Metric,
    horizon: usize,
    confidence_level: f64,
    scale_factor: f64,
}

impl SeasonalForecaster {
    /// Create a forecaster for `metric`; `config` is assumed validated
    pub fn new(config: &ForecastConfig, metric: Metric) -> Self {
        let model = SarimaModel::new(config.order, config.seasonal_order)
            .with_max_iterations(config.max_iterations)
            .with_timeout(config.fit_timeout());

        Self {
            model,
            metric,
            horizon: config.horizon,
            confidence_level: config.confidence_level,
            scale_factor: config.scale_factor_for(metric),
        }
    }

    /// Forecast `horizon` months past the end of `series`
    pub fn forecast(&self, group_key: &str, series: &NormalizedSeries) -> Result<ForecastResult> {
        let scaled: Vec<f64> = series.values().iter().map(|v| v / self.scale_factor).collect();

        let trained = self.model.train(&scaled)?;
        let forecast = trained
            .forecast(self.horizon, self.confidence_level)?
            .rescaled(self.scale_factor);

        let points = series
            .next_periods(self.horizon)?
            .into_iter()
            .zip(forecast.values().iter().zip(forecast.intervals().iter()))
            .map(|(period, (value, (lower, upper)))| ForecastPoint {
                period,
                point_estimate: *value,
                lower_bound: *lower,
                upper_bound: *upper,
            })
            .collect();

        ForecastResult::new(
            group_key,
            self.metric,
            points,
            series.clone(),
            trained.diagnostics(),
        )
    }
}
