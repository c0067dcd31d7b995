//! Historical risk metrics of a return series

use crate::error::{ForecastError, Result};
use crate::report::RiskMetrics;
use forecast_math::{mean, percentile};

/// Historical Value-at-Risk: the `(1 − level)` percentile of returns
pub fn value_at_risk(returns: &[f64], level: f64) -> Result<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "VaR level must be between 0 and 1, got {}",
            level
        )));
    }
    Ok(percentile(returns, (1.0 - level) * 100.0)?)
}

/// Conditional VaR: mean of the returns at or below the VaR
pub fn conditional_value_at_risk(returns: &[f64], level: f64) -> Result<f64> {
    let var = value_at_risk(returns, level)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    Ok(mean(&tail)?)
}

/// VaR and CVaR at 95% and 99%
pub fn risk_metrics(returns: &[f64]) -> Result<RiskMetrics> {
    Ok(RiskMetrics {
        var_95: value_at_risk(returns, 0.95)?,
        cvar_95: conditional_value_at_risk(returns, 0.95)?,
        var_99: value_at_risk(returns, 0.99)?,
        cvar_99: conditional_value_at_risk(returns, 0.99)?,
    })
}
