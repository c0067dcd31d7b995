//! Standard normal helpers for confidence bands and p-values

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| MathError::CalculationError(e.to_string()))
}

/// Two-sided normal quantile for a confidence level, `Φ⁻¹((1 + level) / 2)`
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Confidence level must be between 0 and 1, got {}",
            confidence_level
        )));
    }
    Ok(standard_normal()?.inverse_cdf((1.0 + confidence_level) / 2.0))
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}
