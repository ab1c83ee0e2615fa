//! Lag polynomial algebra
//!
//! A lag polynomial `c(B) = c_0 + c_1 B + c_2 B^2 + ...` is stored as its
//! coefficient vector, lowest power first. Every polynomial built here is
//! monic (`c_0 == 1`).

use crate::{MathError, Result};

/// Multiply two lag polynomials
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product
}

/// Build `1 + sign * (c_1 B^lag + c_2 B^{2 lag} + ...)`.
///
/// Autoregressive factors use `sign = -1.0` (`1 - φ_1 B - ...`), moving
/// average factors `sign = 1.0` (`1 + θ_1 B + ...`).
pub fn lag_polynomial(coefficients: &[f64], sign: f64, lag: usize) -> Vec<f64> {
    let lag = lag.max(1);
    let mut poly = vec![0.0; coefficients.len() * lag + 1];
    poly[0] = 1.0;
    for (k, c) in coefficients.iter().enumerate() {
        poly[(k + 1) * lag] = sign * c;
    }
    poly
}

/// `(1 - B)^d (1 - B^period)^seasonal_d`
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    for _ in 0..seasonal_d {
        poly = multiply(&poly, &lag_polynomial(&[1.0], -1.0, period));
    }
    poly
}

/// Apply a lag polynomial as a filter: `w_t = Σ_k c_k y_{t-k}`.
///
/// The first `degree` observations have no complete history and are
/// dropped, so the output is `degree` shorter than the input.
pub fn apply_filter(series: &[f64], poly: &[f64]) -> Vec<f64> {
    let degree = poly.len().saturating_sub(1);
    if series.len() <= degree {
        return Vec::new();
    }

    (degree..series.len())
        .map(|t| {
            poly.iter()
                .enumerate()
                .map(|(k, c)| c * series[t - k])
                .sum()
        })
        .collect()
}

/// Invert [`apply_filter`] for values beyond the end of `history`.
///
/// Given future filtered values `w` and a monic `poly`, solves
/// `y_t = w_t - Σ_{k≥1} c_k y_{t-k}` forward, seeding the recursion with
/// `history`.
pub fn integrate(filtered: &[f64], history: &[f64], poly: &[f64]) -> Result<Vec<f64>> {
    let degree = poly.len().saturating_sub(1);
    if history.len() < degree {
        return Err(MathError::InsufficientData(format!(
            "Integration needs {} past values, got {}",
            degree,
            history.len()
        )));
    }

    let mut extended = history[history.len() - degree..].to_vec();
    let mut out = Vec::with_capacity(filtered.len());
    for w in filtered {
        let t = extended.len();
        let carried: f64 = (1..=degree).map(|k| poly[k] * extended[t - k]).sum();
        let y = w - carried;
        extended.push(y);
        out.push(y);
    }
    Ok(out)
}

/// First `count` weights of `ma(B) / ar(B)` (the MA(∞) or ψ representation).
///
/// `ar` must be monic. Non-stationary `ar` factors are allowed; the weights
/// then do not decay.
pub fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Result<Vec<f64>> {
    if ar.first().copied() != Some(1.0) {
        return Err(MathError::InvalidInput(
            "Autoregressive polynomial must be monic".to_string(),
        ));
    }

    let mut psi = Vec::with_capacity(count);
    for j in 0..count {
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for k in 1..=j.min(ar.len() - 1) {
            value -= ar[k] * psi[j - k];
        }
        psi.push(value);
    }
    Ok(psi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_multiply() {
        // (1 - 0.5B)(1 + 0.2B) = 1 - 0.3B - 0.1B^2
        let product = multiply(&[1.0, -0.5], &[1.0, 0.2]);
        assert_eq!(product.len(), 3);
        assert_abs_diff_eq!(product[1], -0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(product[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_seasonal_lag_polynomial() {
        let poly = lag_polynomial(&[0.4], -1.0, 12);
        assert_eq!(poly.len(), 13);
        assert_eq!(poly[0], 1.0);
        assert_eq!(poly[12], -0.4);
        assert!(poly[1..12].iter().all(|c| *c == 0.0));
    }

    #[test]
    fn test_differencing_polynomial() {
        // (1 - B)(1 - B^4) = 1 - B - B^4 + B^5
        let poly = differencing_polynomial(1, 1, 4);
        assert_eq!(poly, vec![1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_filter_then_integrate() {
        let series: Vec<f64> = (0..30).map(|t| 5.0 + 0.3 * t as f64 + (t % 4) as f64).collect();
        let poly = differencing_polynomial(1, 1, 4);

        let filtered = apply_filter(&series, &poly);
        assert_eq!(filtered.len(), series.len() - 5);

        // rebuild the tail from the head plus the filtered values
        let rebuilt = integrate(&filtered[5..], &series[..10], &poly).unwrap();
        for (a, b) in rebuilt.iter().zip(series[10..].iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_integrate_needs_history() {
        let poly = differencing_polynomial(1, 0, 1);
        assert!(integrate(&[1.0], &[], &poly).is_err());
    }

    #[test]
    fn test_psi_weights_ar1() {
        let psi = psi_weights(&[1.0, -0.5], &[1.0], 5).unwrap();
        let expected = [1.0, 0.5, 0.25, 0.125, 0.0625];
        for (a, b) in psi.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_psi_weights_random_walk_with_ma() {
        // (1 - B) y = (1 + 0.4B) e  =>  ψ = 1, 1.4, 1.4, ...
        let psi = psi_weights(&[1.0, -1.0], &[1.0, 0.4], 4).unwrap();
        assert_abs_diff_eq!(psi[0], 1.0, epsilon = 1e-12);
        for w in &psi[1..] {
            assert_abs_diff_eq!(*w, 1.4, epsilon = 1e-12);
        }
    }
}
