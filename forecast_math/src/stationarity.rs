//! Unit root and stationarity tests
//!
//! - Augmented Dickey–Fuller (null: unit root) with a constant term, lag
//!   length chosen by AIC, MacKinnon (1994) approximate p-values and
//!   MacKinnon (2010) finite-sample critical values.
//! - KPSS (null: level stationarity) with a Bartlett-kernel long-run
//!   variance, used to pick the differencing order.

use crate::descriptive::{difference, mean};
use crate::normal::normal_cdf;
use crate::regression::{ols, OlsFit};
use crate::{MathError, Result};
use serde::Serialize;

/// p-value below which the unit root null is rejected
pub const STATIONARITY_ALPHA: f64 = 0.05;

// MacKinnon (1994) response surface, constant-only regression, one series.
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_C_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_C_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces: b0 + b1/T + b2/T^2 + b3/T^3
const TAU_C_2010: [(&str, [f64; 4]); 3] = [
    ("1%", [-3.43035, -6.5393, -16.786, -79.433]),
    ("5%", [-2.86154, -2.8903, -4.234, -40.040]),
    ("10%", [-2.56677, -1.5384, -2.809, 0.0]),
];

// KPSS level-stationarity critical values and their upper-tail probabilities
const KPSS_LEVEL_TABLE: [f64; 4] = [0.347, 0.463, 0.574, 0.739];
const KPSS_LEVEL_PVALUES: [f64; 4] = [0.10, 0.05, 0.025, 0.01];

/// Critical values of the ADF statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_percent: f64,
    #[serde(rename = "5%")]
    pub five_percent: f64,
    #[serde(rename = "10%")]
    pub ten_percent: f64,
}

/// Augmented Dickey–Fuller test result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient
    pub adf_statistic: f64,
    /// MacKinnon approximate p-value
    pub p_value: f64,
    /// Number of lagged differences in the final regression
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    /// Finite-sample critical values
    pub critical_values: CriticalValues,
    /// `p_value < 0.05`
    pub is_stationary: bool,
}

/// KPSS level-stationarity test result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpssResult {
    pub statistic: f64,
    /// Interpolated from the critical table, clipped to `[0.01, 0.10]`
    pub p_value: f64,
    pub lags: usize,
}

impl KpssResult {
    /// Whether stationarity is rejected at `alpha`, i.e. the series should be differenced
    pub fn should_difference(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Default maximum ADF lag, `ceil(12 (n / 100)^(1/4))`, bounded by `n / 2 - 2`
pub fn default_adf_max_lag(nobs: usize) -> Result<usize> {
    let schwert = (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize;
    let bound = (nobs / 2).checked_sub(2).ok_or_else(|| {
        MathError::InsufficientData(format!(
            "ADF test needs at least 4 observations, got {}",
            nobs
        ))
    })?;
    Ok(schwert.min(bound))
}

/// Build the ADF regression for `lags` lagged differences over the sample
/// starting at difference index `start`.
///
/// Regressors: lagged level, then `lags` lagged differences. The intercept
/// comes first in the fit, so the level coefficient sits at index 1.
fn adf_regression(
    levels: &[f64],
    diffs: &[f64],
    lags: usize,
    start: usize,
) -> Result<OlsFit> {
    let sample = start..diffs.len();
    let y: Vec<f64> = sample.clone().map(|t| diffs[t]).collect();
    let mut regressors = vec![sample.clone().map(|t| levels[t]).collect::<Vec<f64>>()];
    for lag in 1..=lags {
        regressors.push(sample.clone().map(|t| diffs[t - lag]).collect());
    }
    ols(&y, &regressors)
}

/// Augmented Dickey–Fuller test with a constant.
///
/// When `max_lag` is `None` the Schwert rule is used. The lag order is chosen
/// by minimum AIC over `0..=max_lag` on a common sample, then the regression
/// is re-estimated on the full sample available for that lag.
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> Result<AdfResult> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "ADF test requires finite values".to_string(),
        ));
    }
    let max_lag = match max_lag {
        Some(lag) => lag,
        None => default_adf_max_lag(series.len())?,
    };
    let diffs = difference(series, 1);
    if diffs.len() < max_lag + 4 {
        return Err(MathError::InsufficientData(format!(
            "ADF test with {} lags needs at least {} observations",
            max_lag,
            max_lag + 5
        )));
    }

    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=max_lag {
        let fit = adf_regression(series, &diffs, lags, max_lag)?;
        let aic = fit.aic();
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lags));
        }
    }
    let used_lag = best.map(|(_, lags)| lags).unwrap_or(0);

    let fit = adf_regression(series, &diffs, used_lag, used_lag)?;
    let adf_statistic = fit.t_stat(1)?;
    let p_value = mackinnon_p_value(adf_statistic)?;

    Ok(AdfResult {
        adf_statistic,
        p_value,
        used_lag,
        nobs: fit.nobs,
        critical_values: mackinnon_critical_values(fit.nobs),
        is_stationary: p_value < STATIONARITY_ALPHA,
    })
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// MacKinnon (1994) approximate asymptotic p-value for a constant-only ADF regression
pub fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX_C {
        return Ok(1.0);
    }
    if statistic < TAU_MIN_C {
        return Ok(0.0);
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR_C {
        &TAU_C_SMALLP
    } else {
        &TAU_C_LARGEP
    };
    normal_cdf(polyval(coefficients, statistic))
}

/// MacKinnon (2010) critical values for `nobs` observations
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    let t = nobs as f64;
    let values: Vec<f64> = TAU_C_2010
        .iter()
        .map(|(_, b)| b[0] + b[1] / t + b[2] / (t * t) + b[3] / (t * t * t))
        .collect();
    CriticalValues {
        one_percent: values[0],
        five_percent: values[1],
        ten_percent: values[2],
    }
}

/// KPSS test for level stationarity.
///
/// The truncation lag is `trunc(3 √n / 13)`.
pub fn kpss_test(series: &[f64]) -> Result<KpssResult> {
    let n = series.len();
    if n < 3 {
        return Err(MathError::InsufficientData(
            "KPSS test needs at least 3 observations".to_string(),
        ));
    }
    let m = mean(series)?;
    let residuals: Vec<f64> = series.iter().map(|v| v - m).collect();
    let lags = (3.0 * (n as f64).sqrt() / 13.0).trunc() as usize;

    let mut partial = 0.0;
    let eta = residuals
        .iter()
        .map(|e| {
            partial += e;
            partial * partial
        })
        .sum::<f64>()
        / (n * n) as f64;

    let mut long_run = residuals.iter().map(|e| e * e).sum::<f64>();
    for k in 1..=lags.min(n - 1) {
        let weight = 1.0 - k as f64 / (lags as f64 + 1.0);
        let autocov: f64 = residuals[k..]
            .iter()
            .zip(residuals.iter())
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * autocov;
    }
    long_run /= n as f64;

    if long_run <= f64::EPSILON {
        return Err(MathError::CalculationError(
            "KPSS long-run variance is zero for a constant series".to_string(),
        ));
    }

    let statistic = eta / long_run;
    Ok(KpssResult {
        statistic,
        p_value: interpolate_kpss_p_value(statistic),
        lags,
    })
}

fn interpolate_kpss_p_value(statistic: f64) -> f64 {
    let table = KPSS_LEVEL_TABLE;
    let p = KPSS_LEVEL_PVALUES;
    if statistic <= table[0] {
        return p[0];
    }
    if statistic >= table[table.len() - 1] {
        return p[p.len() - 1];
    }
    for i in 1..table.len() {
        if statistic <= table[i] {
            let w = (statistic - table[i - 1]) / (table[i] - table[i - 1]);
            return p[i - 1] + w * (p[i] - p[i - 1]);
        }
    }
    p[p.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic pseudo-random shocks in [-0.5, 0.5)
    fn shocks(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect()
    }

    fn random_walk(n: usize) -> Vec<f64> {
        let mut level = 100.0;
        shocks(n, 7)
            .into_iter()
            .map(|e| {
                level += e + 0.3;
                level
            })
            .collect()
    }

    #[test]
    fn test_white_noise_is_stationary() {
        let noise = shocks(200, 42);
        let result = adf_test(&noise, None).unwrap();
        assert!(result.adf_statistic < result.critical_values.five_percent);
        assert!(result.is_stationary);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_trending_walk_is_not_stationary() {
        let walk = random_walk(150);
        let result = adf_test(&walk, None).unwrap();
        assert!(!result.is_stationary);
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn test_critical_values_are_ordered() {
        let cv = mackinnon_critical_values(100);
        assert!(cv.one_percent < cv.five_percent);
        assert!(cv.five_percent < cv.ten_percent);
        assert_relative_eq!(cv.five_percent, -2.8909, epsilon = 1e-3);
    }

    #[test]
    fn test_mackinnon_p_value_bounds_and_continuity() {
        assert_eq!(mackinnon_p_value(5.0).unwrap(), 1.0);
        assert_eq!(mackinnon_p_value(-25.0).unwrap(), 0.0);
        let left = mackinnon_p_value(TAU_STAR_C).unwrap();
        let right = mackinnon_p_value(TAU_STAR_C + 1e-9).unwrap();
        assert!((left - right).abs() < 1e-3);
        assert_relative_eq!(mackinnon_p_value(-2.86).unwrap(), 0.05, epsilon = 2e-3);
    }

    #[test]
    fn test_default_max_lag() {
        assert_eq!(default_adf_max_lag(100).unwrap(), 12);
        assert_eq!(default_adf_max_lag(30).unwrap(), 9);
        assert_eq!(default_adf_max_lag(10).unwrap(), 3);
        assert!(default_adf_max_lag(2).is_err());
    }

    #[test]
    fn test_kpss_flags_trend_but_not_noise() {
        let walk = random_walk(150);
        assert!(kpss_test(&walk).unwrap().should_difference(0.05));

        let noise = shocks(150, 3);
        assert!(kpss_test(&noise).unwrap().statistic < KPSS_LEVEL_TABLE[3]);
    }

    #[test]
    fn test_kpss_p_value_interpolation() {
        assert_relative_eq!(interpolate_kpss_p_value(0.1), 0.10);
        assert_relative_eq!(interpolate_kpss_p_value(0.463), 0.05, epsilon = 1e-12);
        assert_relative_eq!(interpolate_kpss_p_value(2.0), 0.01);
    }

    #[test]
    fn test_constant_series_errors() {
        assert!(kpss_test(&[5.0; 20]).is_err());
    }
}
