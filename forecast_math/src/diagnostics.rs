//! Serial correlation diagnostics

use crate::descriptive::autocorrelation;
use crate::{MathError, Result};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Ljung–Box portmanteau test result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LjungBox {
    /// Q statistic
    pub statistic: f64,
    /// Upper-tail chi-squared p-value
    pub p_value: f64,
    /// Number of autocorrelation lags included in Q
    pub lags: usize,
    /// Degrees of freedom of the reference distribution
    pub df: usize,
}

/// Ljung–Box test for autocorrelation up to `lags`.
///
/// `Q = n (n + 2) Σ ρ_k² / (n − k)`, compared against a chi-squared
/// distribution with `lags − model_df` degrees of freedom.
pub fn ljung_box(values: &[f64], lags: usize, model_df: usize) -> Result<LjungBox> {
    if lags == 0 {
        return Err(MathError::InvalidInput(
            "Ljung-Box test needs at least one lag".to_string(),
        ));
    }
    if values.len() <= lags + 1 {
        return Err(MathError::InsufficientData(format!(
            "Ljung-Box test with {} lags needs more than {} observations",
            lags,
            lags + 1
        )));
    }
    if lags <= model_df {
        return Err(MathError::InvalidInput(format!(
            "Lags ({}) must exceed the model degrees of freedom ({})",
            lags, model_df
        )));
    }

    let n = values.len() as f64;
    let mut statistic = 0.0;
    for k in 1..=lags {
        let rho = autocorrelation(values, k)?;
        statistic += rho * rho / (n - k as f64);
    }
    statistic *= n * (n + 2.0);

    let df = lags - model_df;
    let chi2 = ChiSquared::new(df as f64).map_err(|e| MathError::CalculationError(e.to_string()))?;
    let p_value = (1.0 - chi2.cdf(statistic)).clamp(0.0, 1.0);

    Ok(LjungBox {
        statistic,
        p_value,
        lags,
        df,
    })
}
