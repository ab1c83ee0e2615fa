//! Reparameterisations onto the stationary / invertible region
//!
//! Optimisers search an unconstrained space; these maps send any real vector
//! to the coefficients of a stationary autoregressive polynomial
//! `1 - φ_1 B - ... - φ_p B^p` (all roots outside the unit circle) via
//! partial autocorrelations and the Durbin-Levinson recursion (Jones, 1980).

use crate::{MathError, Result};

/// Map unconstrained values to stationary AR coefficients `φ`.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }

    let partial: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut previous: Vec<f64> = Vec::with_capacity(n);
    for (k, r) in partial.iter().enumerate() {
        let mut current = vec![0.0; k + 1];
        for i in 0..k {
            current[i] = previous[i] + r * previous[k - i - 1];
        }
        current[k] = *r;
        previous = current;
    }

    previous.into_iter().map(|y| -y).collect()
}

/// Inverse of [`constrain_stationary`].
///
/// Fails when `constrained` is not stationary.
pub fn unconstrain_stationary(constrained: &[f64]) -> Result<Vec<f64>> {
    let n = constrained.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut current: Vec<f64> = constrained.iter().map(|c| -c).collect();
    let mut partial = vec![0.0; n];
    for k in (0..n).rev() {
        let r = current[k];
        if r.abs() >= 1.0 {
            return Err(MathError::InvalidInput(format!(
                "Coefficients {:?} are not stationary",
                constrained
            )));
        }
        partial[k] = r;
        let denom = 1.0 - r * r;
        current = (0..k)
            .map(|i| (current[i] - r * current[k - i - 1]) / denom)
            .collect();
    }

    Ok(partial.iter().map(|r| r / (1.0 - r * r).sqrt()).collect())
}

/// Map unconstrained values to invertible MA coefficients `θ` of
/// `1 + θ_1 B + ... + θ_q B^q`.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
    constrain_stationary(unconstrained)
        .into_iter()
        .map(|c| -c)
        .collect()
}

/// Inverse of [`constrain_invertible`].
pub fn unconstrain_invertible(constrained: &[f64]) -> Result<Vec<f64>> {
    let flipped: Vec<f64> = constrained.iter().map(|c| -c).collect();
    unconstrain_stationary(&flipped)
}
