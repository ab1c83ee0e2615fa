//! Derivative-free minimisation
//!
//! A bounded Nelder-Mead simplex search. Likelihood fits use it because the
//! Kalman filter log-likelihood has no cheap analytic gradient.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Settings for a Nelder-Mead run
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadConfig {
    /// Maximum number of simplex iterations
    pub max_iterations: usize,
    /// Spread of objective values across the simplex at convergence
    pub f_tolerance: f64,
    /// Largest coordinate distance from the best vertex at convergence
    pub x_tolerance: f64,
    /// Size of the initial simplex along each axis
    pub initial_step: f64,
    /// Reflection coefficient
    pub alpha: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Contraction coefficient
    pub rho: f64,
    /// Shrink coefficient
    pub sigma: f64,
    /// Wall-clock budget for the whole run
    pub time_limit: Option<Duration>,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            f_tolerance: 1e-8,
            x_tolerance: 1e-6,
            initial_step: 0.5,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            time_limit: None,
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Both tolerances were met
    Converged,
    /// The iteration budget ran out first
    MaxIterations,
    /// The time limit passed first
    TimedOut,
}

/// Best point found by a run
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl Minimum {
    /// Whether the run met its tolerances
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Minimise `objective` starting from `initial`.
///
/// Non-finite objective values are treated as `+inf`, so an objective may
/// signal an infeasible point by returning NaN. When `bounds` is given every
/// trial point is clamped into the box before evaluation.
///
/// # Example
///
/// ```
/// use forecast_math::optimization::{nelder_mead, NelderMeadConfig};
///
/// let min = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     &NelderMeadConfig::default(),
/// )
/// .unwrap();
///
/// assert!(min.converged());
/// assert!((min.point[0] - 2.0).abs() < 1e-4);
/// assert!((min.point[1] + 1.0).abs() < 1e-4);
/// ```
pub fn nelder_mead<F>(
    mut objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> Result<Minimum>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return Err(MathError::InvalidInput(
            "Nelder-Mead needs at least one parameter".to_string(),
        ));
    }
    if let Some(b) = bounds {
        if b.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Expected {} bounds, got {}",
                n,
                b.len()
            )));
        }
    }

    let deadline = config
        .time_limit
        .and_then(|limit| Instant::now().checked_add(limit));
    let mut eval = |x: &[f64]| {
        let value = objective(x);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial, bounds));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += config.initial_step;
        let mut vertex = clamp(&vertex, bounds);
        // a vertex clamped back onto the start point would make the simplex degenerate
        if (vertex[i] - simplex[0][i]).abs() < f64::EPSILON {
            vertex[i] = simplex[0][i] - config.initial_step;
            vertex = clamp(&vertex, bounds);
        }
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let termination = loop {
        order_simplex(&mut simplex, &mut values);

        let f_spread = (values[n] - values[0]).abs();
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(simplex[0].iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        if values[0].is_finite()
            && f_spread <= config.f_tolerance
            && x_spread <= config.x_tolerance
        {
            break Termination::Converged;
        }
        if iterations >= config.max_iterations {
            break Termination::MaxIterations;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break Termination::TimedOut;
        }
        iterations += 1;

        let centroid = centroid(&simplex[..n]);
        let worst = simplex[n].clone();

        let reflected = clamp(&affine(&centroid, &worst, -config.alpha), bounds);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = clamp(&affine(&centroid, &reflected, config.gamma), bounds);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted, accept) = if f_reflected < values[n] {
            let c = clamp(&affine(&centroid, &reflected, config.rho), bounds);
            let fc = eval(&c);
            let accept = fc <= f_reflected;
            (c, fc, accept)
        } else {
            let c = clamp(&affine(&centroid, &worst, config.rho), bounds);
            let fc = eval(&c);
            let accept = fc < values[n];
            (c, fc, accept)
        };

        if accept {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=n {
            let shrunk = clamp(&affine(&best, &simplex[i], config.sigma), bounds);
            values[i] = eval(&shrunk);
            simplex[i] = shrunk;
        }
    };

    order_simplex(&mut simplex, &mut values);
    Ok(Minimum {
        point: simplex.swap_remove(0),
        value: values[0],
        iterations,
        termination,
    })
}

/// `origin + t * (target - origin)`
fn affine(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target.iter())
        .map(|(o, p)| o + t * (p - o))
        .collect()
}

fn centroid(vertices: &[Vec<f64>]) -> Vec<f64> {
    let dim = vertices[0].len();
    let mut c = vec![0.0; dim];
    for v in vertices {
        for (acc, x) in c.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let count = vertices.len() as f64;
    c.iter_mut().for_each(|x| *x /= count);
    c
}

fn clamp(point: &[f64], bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    match bounds {
        Some(b) => point
            .iter()
            .zip(b.iter())
            .map(|(x, (lo, hi))| x.clamp(*lo, *hi))
            .collect(),
        None => point.to_vec(),
    }
}

fn order_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}
