//! Kalman filter for ARMA processes in state-space form
//!
//! An ARMA(p, q) process `w_t` is written with state dimension
//! `m = max(p, q + 1)`:
//!
//! ```text
//! w_t     = Z a_t,              Z = e_1'
//! a_{t+1} = T a_t + R ε_{t+1},  T = [φ | I_{m-1} ; 0'],  R = (1, θ_1, ..., θ_{m-1})'
//! ```
//!
//! The filter runs with unit innovation variance; σ² is concentrated out of
//! the likelihood afterwards. Because `T` is a companion matrix the time
//! update costs `O(m²)` instead of a full matrix product.

use crate::error::{ForecastError, Result};
use forecast_math::matrix::{solve_discrete_lyapunov, Matrix};
use std::f64::consts::PI;

const MAX_DOUBLINGS: usize = 100;

/// ARMA model in companion state-space form
#[derive(Debug, Clone)]
pub struct ArmaStateSpace {
    phi: Vec<f64>,
    r: Vec<f64>,
}

/// Sufficient statistics of one filter pass
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// `Σ ln F_t`
    pub log_det: f64,
    /// `Σ v_t² / F_t`
    pub weighted_ss: f64,
    /// Number of observations filtered
    pub n_obs: usize,
    /// Predicted state for the step after the last observation
    pub next_state: Vec<f64>,
}

impl FilterOutput {
    /// Maximum likelihood estimate of the innovation variance
    pub fn sigma2(&self) -> f64 {
        self.weighted_ss / self.n_obs as f64
    }

    /// Gaussian log-likelihood with σ² concentrated out
    pub fn log_likelihood(&self) -> f64 {
        let n = self.n_obs as f64;
        -0.5 * n * ((2.0 * PI).ln() + 1.0 + self.sigma2().ln()) - 0.5 * self.log_det
    }
}

impl ArmaStateSpace {
    /// Build from monic lag polynomials `ar(B) = 1 - φ_1 B - ...` and
    /// `ma(B) = 1 + θ_1 B + ...`
    pub fn new(ar: &[f64], ma: &[f64]) -> Result<Self> {
        if ar.first().copied() != Some(1.0) || ma.first().copied() != Some(1.0) {
            return Err(ForecastError::ModelFit(
                "ARMA polynomials must be monic".to_string(),
            ));
        }

        let p = ar.len() - 1;
        let q = ma.len() - 1;
        let m = p.max(q + 1);

        let mut phi = vec![0.0; m];
        for i in 0..p {
            phi[i] = -ar[i + 1];
        }
        let mut r = vec![0.0; m];
        r[..=q].copy_from_slice(ma);

        Ok(Self { phi, r })
    }

    /// State dimension
    pub fn dim(&self) -> usize {
        self.phi.len()
    }

    /// Transition matrix `T`
    pub fn transition(&self) -> Matrix {
        let m = self.dim();
        let mut t = Matrix::zeros(m);
        for i in 0..m {
            t[(i, 0)] = self.phi[i];
            if i + 1 < m {
                t[(i, i + 1)] = 1.0;
            }
        }
        t
    }

    /// Unconditional state covariance, solving `P = T P T' + R R'`
    pub fn stationary_covariance(&self) -> Result<Matrix> {
        let p = solve_discrete_lyapunov(&self.transition(), &Matrix::outer(&self.r), MAX_DOUBLINGS)?;
        Ok(p)
    }

    fn advance_state(&self, a: &[f64]) -> Vec<f64> {
        let m = self.dim();
        (0..m)
            .map(|i| self.phi[i] * a[0] + if i + 1 < m { a[i + 1] } else { 0.0 })
            .collect()
    }

    /// `T P T' + R R'`
    fn advance_covariance(&self, p: &Matrix) -> Matrix {
        let m = self.dim();
        let below = |mat: &Matrix, i: usize, j: usize| if i + 1 < m { mat[(i + 1, j)] } else { 0.0 };
        let right = |mat: &Matrix, i: usize, j: usize| if j + 1 < m { mat[(i, j + 1)] } else { 0.0 };

        let mut tp = Matrix::zeros(m);
        for i in 0..m {
            for j in 0..m {
                tp[(i, j)] = self.phi[i] * p[(0, j)] + below(p, i, j);
            }
        }

        let mut next = Matrix::zeros(m);
        for i in 0..m {
            for j in 0..m {
                next[(i, j)] = self.phi[j] * tp[(i, 0)] + right(&tp, i, j) + self.r[i] * self.r[j];
            }
        }
        next
    }

    /// Run the filter over `w`, starting from the stationary distribution
    pub fn filter(&self, w: &[f64]) -> Result<FilterOutput> {
        if w.is_empty() {
            return Err(ForecastError::InsufficientData(
                "Kalman filter needs at least one observation".to_string(),
            ));
        }

        let m = self.dim();
        let mut a = vec![0.0; m];
        let mut p = self.stationary_covariance()?;
        let mut log_det = 0.0;
        let mut weighted_ss = 0.0;

        for &y in w {
            let v = y - a[0];
            let f = p[(0, 0)];
            if !(f.is_finite() && f > 0.0) {
                return Err(ForecastError::ModelFit(format!(
                    "Non-positive prediction variance {}",
                    f
                )));
            }

            log_det += f.ln();
            weighted_ss += v * v / f;

            let gain: Vec<f64> = (0..m).map(|i| p[(i, 0)] / f).collect();
            let filtered_state: Vec<f64> = a.iter().zip(gain.iter()).map(|(ai, k)| ai + k * v).collect();
            let mut filtered_cov = p.clone();
            for i in 0..m {
                for j in 0..m {
                    filtered_cov[(i, j)] -= gain[i] * p[(0, j)];
                }
            }

            a = self.advance_state(&filtered_state);
            p = self.advance_covariance(&filtered_cov);
        }

        if !(log_det.is_finite() && weighted_ss.is_finite()) {
            return Err(ForecastError::ModelFit(
                "Kalman filter produced non-finite values".to_string(),
            ));
        }

        Ok(FilterOutput {
            log_det,
            weighted_ss,
            n_obs: w.len(),
            next_state: a,
        })
    }

    /// Mean forecasts of `w` from a predicted state
    pub fn project(&self, state: &[f64], horizon: usize) -> Vec<f64> {
        let mut a = state.to_vec();
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            out.push(a[0]);
            a = self.advance_state(&a);
        }
        out
    }
}
