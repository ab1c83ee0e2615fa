//! # Sales Forecast Workspace
//!
//! Umbrella crate for the workspace: [`sales_forecast`] runs grouped
//! seasonal forecasts over monthly sales exports, [`forecast_math`] holds the
//! numerical pieces it is built from.
//!
//! ## Example
//!
//! ```
//! use sales_forecast_workspace::sales_forecast::{ForecastConfig, Metric};
//!
//! let config = ForecastConfig::default();
//! assert_eq!(config.horizon, 12);
//! assert_eq!(config.scale_factor_for(Metric::Revenue), 100_000.0);
//! ```

pub use forecast_math;
pub use sales_forecast;

/// Version of the forecasting crate
pub const VERSION: &str = sales_forecast::VERSION;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_reexport() {
        assert_eq!(sales_forecast::NAME, "sales_forecast");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_math_reexport() {
        let z = forecast_math::stats::two_sided_z(0.95).unwrap();
        assert!((z - 1.96).abs() < 1e-2);
    }
}
