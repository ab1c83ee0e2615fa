//! Seasonal ARIMA estimated by exact maximum likelihood

use crate::config::{ModelOrder, SeasonalOrder};
use crate::error::{ForecastError, Result};
use crate::models::kalman::ArmaStateSpace;
use crate::models::{FitDiagnostics, ForecastModel, ModelForecast, TrainedForecastModel};
use forecast_math::optimization::{nelder_mead, Minimum, NelderMeadConfig, Termination};
use forecast_math::polynomial::{
    apply_filter, differencing_polynomial, integrate, lag_polynomial, multiply, psi_weights,
};
use forecast_math::stationarity::{constrain_invertible, constrain_stationary};
use forecast_math::stats::{max_abs, two_sided_z};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Unconstrained parameters are searched in `[-BOUND, BOUND]`
const PARAM_BOUND: f64 = 10.0;

/// Differenced series this small relative to the data count as exactly zero
const DEGENERATE_TOLERANCE: f64 = 1e-10;

/// SARIMA(p,d,q)(P,D,Q,s) model
#[derive(Debug, Clone)]
pub struct SarimaModel {
    name: String,
    order: ModelOrder,
    seasonal: SeasonalOrder,
    optimizer: NelderMeadConfig,
    timeout: Option<Duration>,
}

/// Fitted ARMA coefficients of the differenced series
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

/// Trained SARIMA model
#[derive(Debug, Clone)]
pub struct TrainedSarima {
    name: String,
    params: SarimaParams,
    /// Full autoregressive polynomial `φ(B)Φ(B^s)`
    ar_poly: Vec<f64>,
    /// Full moving average polynomial `θ(B)Θ(B^s)`
    ma_poly: Vec<f64>,
    diff_poly: Vec<f64>,
    history: Vec<f64>,
    sigma2: f64,
    /// Predicted state after the last observation; `None` for an exact fit
    next_state: Option<Vec<f64>>,
    diagnostics: FitDiagnostics,
}

impl SarimaModel {
    /// Create a new SARIMA model
    pub fn new(order: ModelOrder, seasonal: SeasonalOrder) -> Self {
        let seasonal = if seasonal.is_seasonal() {
            seasonal
        } else {
            SeasonalOrder::new(0, 0, 0, 0)
        };
        Self {
            name: format!(
                "SARIMA({},{},{})({},{},{},{})",
                order.p, order.d, order.q, seasonal.p, seasonal.d, seasonal.q, seasonal.period
            ),
            order,
            seasonal,
            optimizer: NelderMeadConfig::default(),
            timeout: None,
        }
    }

    /// Set the iteration budget of each optimizer run
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.optimizer.max_iterations = max_iterations;
        self
    }

    /// Set the wall-clock budget for a whole fit
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of estimated ARMA coefficients
    pub fn n_params(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    /// Degree of the differencing polynomial
    pub fn differencing_degree(&self) -> usize {
        self.order.d + self.seasonal.d * self.seasonal.period
    }

    /// Shortest series the model can be fitted to: the differenced series
    /// must be longer than the number of ARMA coefficients
    pub fn min_series_len(&self) -> usize {
        self.differencing_degree() + self.n_params() + 1
    }

    /// Map unconstrained optimizer coordinates to coefficients
    fn unpack(&self, x: &[f64]) -> SarimaParams {
        let (p, q, sp) = (self.order.p, self.order.q, self.seasonal.p);
        SarimaParams {
            ar: constrain_stationary(&x[..p]),
            ma: constrain_invertible(&x[p..p + q]),
            seasonal_ar: constrain_stationary(&x[p + q..p + q + sp]),
            seasonal_ma: constrain_invertible(&x[p + q + sp..]),
        }
    }

    fn polynomials(&self, params: &SarimaParams) -> (Vec<f64>, Vec<f64>) {
        let s = self.seasonal.period;
        let ar = multiply(
            &lag_polynomial(&params.ar, -1.0, 1),
            &lag_polynomial(&params.seasonal_ar, -1.0, s),
        );
        let ma = multiply(
            &lag_polynomial(&params.ma, 1.0, 1),
            &lag_polynomial(&params.seasonal_ma, 1.0, s),
        );
        (ar, ma)
    }

    fn filter(&self, params: &SarimaParams, w: &[f64]) -> Result<crate::models::kalman::FilterOutput> {
        let (ar, ma) = self.polynomials(params);
        ArmaStateSpace::new(&ar, &ma)?.filter(w)
    }

    fn negative_log_likelihood(&self, x: &[f64], w: &[f64]) -> f64 {
        match self.filter(&self.unpack(x), w) {
            Ok(out) => -out.log_likelihood(),
            Err(_) => f64::INFINITY,
        }
    }

    /// Nelder-Mead from zero, then once more from its own optimum.
    ///
    /// A restart that exhausts its iteration budget still yields its best
    /// point; only a timeout or a likelihood that is infinite everywhere fails.
    fn optimize(&self, w: &[f64]) -> Result<(Minimum, usize)> {
        let k = self.n_params();
        let bounds = vec![(-PARAM_BOUND, PARAM_BOUND); k];
        let started = Instant::now();
        let mut config = self.optimizer.clone();
        let mut total_iterations = 0;
        let mut start = vec![0.0; k];
        let mut best: Option<Minimum> = None;

        for round in 0..2 {
            if let Some(limit) = self.timeout {
                let remaining = limit.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(ForecastError::ModelFit(format!(
                        "{} fit timed out after {:.1}s",
                        self.name,
                        limit.as_secs_f64()
                    )));
                }
                config.time_limit = Some(remaining);
            }

            let min = nelder_mead(|x| self.negative_log_likelihood(x, w), &start, Some(bounds.as_slice()), &config)?;
            total_iterations += min.iterations;
            trace!(round, value = min.value, iterations = min.iterations, "Optimizer run finished");

            match min.termination {
                Termination::TimedOut => {
                    return Err(ForecastError::ModelFit(format!(
                        "{} fit timed out after {} iterations",
                        self.name, total_iterations
                    )));
                }
                Termination::MaxIterations if round == 1 => {
                    warn!(
                        model = %self.name,
                        iterations = total_iterations,
                        value = min.value,
                        "Optimizer stopped at its iteration budget, keeping the best estimate"
                    );
                }
                _ => {}
            }

            start = min.point.clone();
            best = match best {
                Some(prev) if prev.value <= min.value => Some(Minimum {
                    termination: min.termination,
                    ..prev
                }),
                _ => Some(min),
            };
        }

        let best = best.ok_or_else(|| ForecastError::ModelFit("Optimizer did not run".to_string()))?;
        if !best.value.is_finite() {
            return Err(ForecastError::ModelFit(format!(
                "{} likelihood is not finite anywhere in the search region",
                self.name
            )));
        }
        Ok((best, total_iterations))
    }

    fn no_params(&self) -> SarimaParams {
        SarimaParams {
            ar: vec![0.0; self.order.p],
            ma: vec![0.0; self.order.q],
            seasonal_ar: vec![0.0; self.seasonal.p],
            seasonal_ma: vec![0.0; self.seasonal.q],
        }
    }

    fn trained(
        &self,
        params: SarimaParams,
        history: &[f64],
        sigma2: f64,
        next_state: Option<Vec<f64>>,
        diagnostics: FitDiagnostics,
    ) -> TrainedSarima {
        let (ar_poly, ma_poly) = self.polynomials(&params);
        TrainedSarima {
            name: self.name.clone(),
            params,
            ar_poly,
            ma_poly,
            diff_poly: differencing_polynomial(self.order.d, self.seasonal.d, self.seasonal.period),
            history: history.to_vec(),
            sigma2,
            next_state,
            diagnostics,
        }
    }
}

impl ForecastModel for SarimaModel {
    type Trained = TrainedSarima;

    fn train(&self, values: &[f64]) -> Result<Self::Trained> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "{}: series contains non-finite values",
                self.name
            )));
        }

        let k = self.n_params();
        if values.len() < self.min_series_len() {
            return Err(ForecastError::ModelFit(format!(
                "{} needs at least {} observations ({} after differencing), got {}",
                self.name,
                self.min_series_len(),
                k + 1,
                values.len()
            )));
        }

        let diff_poly = differencing_polynomial(self.order.d, self.seasonal.d, self.seasonal.period);
        let w = apply_filter(values, &diff_poly);

        // exact trend and season: nothing left to estimate
        if max_abs(&w) <= DEGENERATE_TOLERANCE * max_abs(values) {
            debug!(model = %self.name, n_obs = values.len(), "Differenced series is zero, exact fit");
            let diagnostics = FitDiagnostics {
                model: self.name.clone(),
                log_likelihood: None,
                aic: None,
                sigma2: 0.0,
                iterations: 0,
                termination: None,
                n_obs: values.len(),
            };
            return Ok(self.trained(self.no_params(), values, 0.0, None, diagnostics));
        }

        let (params, iterations, termination) = if k == 0 {
            (self.no_params(), 0, None)
        } else {
            let (min, iterations) = self.optimize(&w)?;
            (self.unpack(&min.point), iterations, Some(min.termination))
        };

        let out = self
            .filter(&params, &w)
            .map_err(|e| ForecastError::ModelFit(format!("{}: {}", self.name, e)))?;
        let log_likelihood = out.log_likelihood();
        let sigma2 = out.sigma2();
        if !(log_likelihood.is_finite() && sigma2.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "{}: non-finite likelihood at the optimum",
                self.name
            )));
        }

        debug!(
            model = %self.name,
            n_obs = values.len(),
            log_likelihood,
            sigma2,
            iterations,
            "Fitted"
        );

        let diagnostics = FitDiagnostics {
            model: self.name.clone(),
            log_likelihood: Some(log_likelihood),
            aic: Some(-2.0 * log_likelihood + 2.0 * (k + 1) as f64),
            sigma2,
            iterations,
            termination,
            n_obs: values.len(),
        };
        Ok(self.trained(params, values, sigma2, Some(out.next_state), diagnostics))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSarima {
    /// Fitted coefficients
    pub fn params(&self) -> &SarimaParams {
        &self.params
    }

    /// Innovation variance
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }
}

impl TrainedForecastModel for TrainedSarima {
    fn forecast(&self, horizon: usize, confidence_level: f64) -> Result<ModelForecast> {
        let z = two_sided_z(confidence_level)
            .map_err(|e| ForecastError::Configuration(e.to_string()))?;

        let w_forecast = match &self.next_state {
            Some(state) => ArmaStateSpace::new(&self.ar_poly, &self.ma_poly)?.project(state, horizon),
            None => vec![0.0; horizon],
        };
        let values = integrate(&w_forecast, &self.history, &self.diff_poly)?;

        let integrated_ar = multiply(&self.ar_poly, &self.diff_poly);
        let psi = psi_weights(&integrated_ar, &self.ma_poly, horizon)?;
        let mut cumulative = 0.0;
        let std_errors = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        let forecast = ModelForecast::new(values, std_errors, z)?;
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFit(format!(
                "{} produced a non-finite forecast",
                self.name
            )));
        }
        Ok(forecast)
    }

    fn diagnostics(&self) -> FitDiagnostics {
        self.diagnostics.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn default_model() -> SarimaModel {
        SarimaModel::new(ModelOrder::default(), SeasonalOrder::default())
    }

    #[test]
    fn test_name_and_sizes() {
        let model = default_model();
        assert_eq!(model.name(), "SARIMA(1,1,1)(1,1,1,12)");
        assert_eq!(model.n_params(), 4);
        assert_eq!(model.differencing_degree(), 13);
        assert_eq!(model.min_series_len(), 18);

        let plain = SarimaModel::new(ModelOrder::new(1, 1, 0), SeasonalOrder::new(0, 0, 0, 12));
        assert_eq!(plain.name(), "SARIMA(1,1,0)(0,0,0,0)");
        assert_eq!(plain.differencing_degree(), 1);
    }

    #[test]
    fn test_too_short_after_differencing() {
        let values: Vec<f64> = (0..17).map(|t| t as f64).collect();
        assert!(matches!(
            default_model().train(&values),
            Err(ForecastError::ModelFit(_))
        ));
    }

    #[test]
    fn test_exact_seasonal_pattern() {
        let values: Vec<f64> = (0..36)
            .map(|t| 100.0 + t as f64 + if t % 12 == 11 { 10.0 } else { 0.0 })
            .collect();
        let trained = default_model().train(&values).unwrap();
        assert_eq!(trained.diagnostics().termination, None);

        let forecast = trained.forecast(12, 0.95).unwrap();
        for (h, v) in forecast.values().iter().enumerate() {
            let t = 36 + h;
            let expected = 100.0 + t as f64 + if t % 12 == 11 { 10.0 } else { 0.0 };
            assert_abs_diff_eq!(*v, expected, epsilon = 1e-8);
        }
        assert!(forecast.std_errors().iter().all(|se| *se == 0.0));
    }

    #[test]
    fn test_ar1_recovers_coefficient() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut values = vec![0.0];
        for _ in 1..400 {
            let prev = values[values.len() - 1];
            values.push(0.6 * prev + noise.sample(&mut rng));
        }

        let model = SarimaModel::new(ModelOrder::new(1, 0, 0), SeasonalOrder::new(0, 0, 0, 0));
        let trained = model.train(&values).unwrap();

        assert!((trained.params().ar[0] - 0.6).abs() < 0.1);
        assert!((trained.sigma2() - 1.0).abs() < 0.2);
    }

    #[test]
    fn test_random_walk_intervals_widen() {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut values = vec![50.0];
        for _ in 1..60 {
            let prev = values[values.len() - 1];
            values.push(prev + noise.sample(&mut rng));
        }

        let model = SarimaModel::new(ModelOrder::new(0, 1, 0), SeasonalOrder::new(0, 0, 0, 0));
        let trained = model.train(&values).unwrap();
        let forecast = trained.forecast(5, 0.95).unwrap();

        // random walk: flat mean, se grows with sqrt(h)
        for v in forecast.values() {
            assert_abs_diff_eq!(*v, values[59], epsilon = 1e-9);
        }
        let se = forecast.std_errors();
        assert_abs_diff_eq!(se[3] / se[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_timeout_is_model_fit_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let values: Vec<f64> = (0..48).map(|t| t as f64 + noise.sample(&mut rng)).collect();

        let model = default_model().with_timeout(Some(Duration::from_nanos(1)));
        assert!(matches!(model.train(&values), Err(ForecastError::ModelFit(_))));
    }
}
