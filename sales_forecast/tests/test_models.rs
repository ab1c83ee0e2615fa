use approx::assert_relative_eq;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use forecast_math::optimization::Termination;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use sales_forecast::config::{ForecastConfig, ModelOrder, SeasonalOrder};
use sales_forecast::data::Metric;
use sales_forecast::models::sarima::SarimaModel;
use sales_forecast::models::seasonal::SeasonalForecaster;
use sales_forecast::models::{ForecastModel, TrainedForecastModel};
use sales_forecast::normalize::NormalizedSeries;
use sales_forecast::ForecastError;
use std::f64::consts::PI;

fn seasonal_value(t: usize) -> f64 {
    100.0 + t as f64 + 10.0 * (2.0 * PI * t as f64 / 12.0).sin()
}

/// 36 months growing from 100 to 135 with a ±10 seasonal swing and a little noise
fn trend_series(seed: u64) -> NormalizedSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();
    let values = (0..36).map(|t| seasonal_value(t) + noise.sample(&mut rng)).collect();
    NormalizedSeries::from_values(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), values).unwrap()
}

#[test]
fn test_forecast_continues_trend_and_season() {
    let config = ForecastConfig::default();
    let result = SeasonalForecaster::new(&config, Metric::Units)
        .forecast("trend", &trend_series(42))
        .unwrap();

    assert_eq!(result.horizon(), 12);
    assert_eq!(
        result.points[0].period,
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    );
    for (h, point) in result.points.iter().enumerate() {
        let expected = seasonal_value(36 + h);
        assert!(
            (point.point_estimate - expected).abs() < 6.0,
            "step {}: forecast {} vs expected {}",
            h + 1,
            point.point_estimate,
            expected
        );
    }
}

#[test]
fn test_interval_width_never_shrinks() {
    let config = ForecastConfig::default();
    let result = SeasonalForecaster::new(&config, Metric::Units)
        .forecast("trend", &trend_series(7))
        .unwrap();

    for point in &result.points {
        assert!(point.lower_bound <= point.point_estimate);
        assert!(point.point_estimate <= point.upper_bound);
    }
    for pair in result.points.windows(2) {
        assert!(pair[1].width() >= pair[0].width() - 1e-9);
    }
    assert!(result.points[0].width() > 0.0);
}

#[test]
fn test_scale_factor_round_trip() {
    let mut rng = StdRng::seed_from_u64(99);
    let noise = Normal::new(0.0, 4_000.0).unwrap();
    let values: Vec<f64> = (0..40)
        .map(|t| 1_000.0 * seasonal_value(t) + noise.sample(&mut rng))
        .collect();
    let series =
        NormalizedSeries::from_values(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(), values).unwrap();

    let unscaled = ForecastConfig {
        scale_factor: Some(1.0),
        ..Default::default()
    };
    let scaled = ForecastConfig {
        scale_factor: Some(100_000.0),
        ..Default::default()
    };

    let a = SeasonalForecaster::new(&unscaled, Metric::Revenue)
        .forecast("g", &series)
        .unwrap();
    let b = SeasonalForecaster::new(&scaled, Metric::Revenue)
        .forecast("g", &series)
        .unwrap();

    for (pa, pb) in a.points.iter().zip(b.points.iter()) {
        assert_relative_eq!(pa.point_estimate, pb.point_estimate, max_relative = 1e-4);
        assert_relative_eq!(pa.lower_bound, pb.lower_bound, max_relative = 1e-4);
        assert_relative_eq!(pa.upper_bound, pb.upper_bound, max_relative = 1e-4);
    }
}

#[test]
fn test_horizon_follows_config() {
    for horizon in [1, 6, 24] {
        let config = ForecastConfig {
            horizon,
            ..Default::default()
        };
        let result = SeasonalForecaster::new(&config, Metric::Units)
            .forecast("trend", &trend_series(3))
            .unwrap();
        assert_eq!(result.points.len(), horizon);
    }
}

#[test]
fn test_iteration_budget_exhausted_keeps_best_estimate() {
    let values: Vec<f64> = trend_series(5).values().to_vec();
    let model = SarimaModel::new(ModelOrder::default(), SeasonalOrder::default()).with_max_iterations(1);

    let trained = model.train(&values).unwrap();
    assert_eq!(trained.diagnostics().termination, Some(Termination::MaxIterations));
    assert!(trained.diagnostics().log_likelihood.unwrap().is_finite());

    let forecast = trained.forecast(12, 0.95).unwrap();
    assert!(forecast.is_finite());
    for ((lower, upper), v) in forecast.intervals().iter().zip(forecast.values()) {
        assert!(lower <= v && v <= upper);
    }
}

/// Dealer-style counts: Poisson sales with roughly 30% empty months
fn sparse_series(seed: u64, months: usize) -> NormalizedSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let sales = Poisson::new(4.0).unwrap();
    let values = (0..months)
        .map(|_| if rng.gen_bool(0.3) { 0.0 } else { sales.sample(&mut rng) })
        .collect();
    NormalizedSeries::from_values(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), values).unwrap()
}

#[test]
fn test_sparse_series_always_forecast() {
    let config = ForecastConfig {
        max_iterations: 200,
        ..Default::default()
    };
    let forecaster = SeasonalForecaster::new(&config, Metric::Units);

    for (seed, months) in [(1, 24), (11, 30), (23, 36), (37, 48)] {
        let series = sparse_series(seed, months);
        let result = forecaster.forecast("sparse", &series).unwrap();
        assert_eq!(result.horizon(), 12);
        for point in &result.points {
            assert!(point.lower_bound <= point.point_estimate);
            assert!(point.point_estimate <= point.upper_bound);
        }
    }
}

#[test]
fn test_diagnostics_are_reported() {
    let values: Vec<f64> = trend_series(11).values().to_vec();
    let model = SarimaModel::new(ModelOrder::default(), SeasonalOrder::default());
    let trained = model.train(&values).unwrap();
    let diagnostics = trained.diagnostics();

    assert_eq!(diagnostics.model, "SARIMA(1,1,1)(1,1,1,12)");
    assert_eq!(diagnostics.n_obs, 36);
    let log_likelihood = diagnostics.log_likelihood.unwrap();
    assert_relative_eq!(diagnostics.aic.unwrap(), -2.0 * log_likelihood + 10.0, max_relative = 1e-12);
    assert!(diagnostics.sigma2 > 0.0);
    assert!(diagnostics.iterations > 0);
}

#[test]
fn test_too_short_series_fails_to_fit() {
    let values: Vec<f64> = (0..15).map(seasonal_value).collect();
    let model = SarimaModel::new(ModelOrder::default(), SeasonalOrder::default());

    assert!(matches!(model.train(&values), Err(ForecastError::ModelFit(_))));
}
