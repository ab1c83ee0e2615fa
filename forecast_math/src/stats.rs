//! Normal quantiles and small descriptive helpers

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile of the standard normal distribution
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Probability must be in (0, 1), got {}",
            p
        )));
    }

    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(format!("Standard normal: {}", e)))?;
    Ok(standard.inverse_cdf(p))
}

/// Two-sided critical value for a central interval with the given coverage.
///
/// `two_sided_z(0.95)` is about 1.96.
pub fn two_sided_z(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Confidence level must be in (0, 1), got {}",
            confidence_level
        )));
    }
    normal_quantile(0.5 + confidence_level / 2.0)
}

/// Largest absolute value, 0.0 for an empty slice
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_known_quantiles() {
        assert_abs_diff_eq!(normal_quantile(0.5).unwrap(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(normal_quantile(0.975).unwrap(), 1.959964, epsilon = 1e-5);
        assert_abs_diff_eq!(two_sided_z(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_abs_diff_eq!(two_sided_z(0.80).unwrap(), 1.281552, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_levels() {
        assert!(two_sided_z(0.0).is_err());
        assert!(two_sided_z(1.0).is_err());
        assert!(two_sided_z(f64::NAN).is_err());
        assert!(normal_quantile(1.2).is_err());
    }

    #[test]
    fn test_max_abs() {
        assert_eq!(max_abs(&[]), 0.0);
        assert_eq!(max_abs(&[1.0, -4.0, 2.5]), 4.0);
    }
}
