//! Descriptive statistics over price and residual series
//!
//! Moments are population (biased) moments, so `std_dev` divides by `n`
//! and `skewness`/`excess_kurtosis` are the Fisher–Pearson estimators
//! without small-sample correction.

use crate::{MathError, Result};

fn require_non_empty(values: &[f64], what: &str) -> Result<()> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(format!(
            "Cannot compute {} of an empty series",
            what
        )));
    }
    Ok(())
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    require_non_empty(values, "mean")?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    Ok(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Result<f64> {
    Ok(variance(values)?.sqrt())
}

/// Central moment of the given order
fn central_moment(values: &[f64], order: i32) -> Result<f64> {
    let m = mean(values)?;
    Ok(values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64)
}

/// Biased sample skewness `m3 / m2^1.5`
pub fn skewness(values: &[f64]) -> Result<f64> {
    let m2 = central_moment(values, 2)?;
    if m2 <= f64::EPSILON {
        return Err(MathError::CalculationError(
            "Skewness is undefined for a constant series".to_string(),
        ));
    }
    Ok(central_moment(values, 3)? / m2.powf(1.5))
}

/// Biased excess kurtosis `m4 / m2^2 - 3`
pub fn excess_kurtosis(values: &[f64]) -> Result<f64> {
    let m2 = central_moment(values, 2)?;
    if m2 <= f64::EPSILON {
        return Err(MathError::CalculationError(
            "Kurtosis is undefined for a constant series".to_string(),
        ));
    }
    Ok(central_moment(values, 4)? / (m2 * m2) - 3.0)
}

/// Percentile with linear interpolation between the two nearest ranks.
///
/// `q` is expressed in percent, `0.0..=100.0`.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    require_non_empty(values, "percentile")?;
    if !(0.0..=100.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile must be between 0 and 100, got {}",
            q
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Cannot rank a series containing NaN".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (sorted.len() - 1) as f64 * q / 100.0;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Ok(sorted[lower] + weight * (sorted[upper] - sorted[lower]))
}

/// Sample autocorrelation at `lag`, normalised by the lag-0 autocovariance
pub fn autocorrelation(values: &[f64], lag: usize) -> Result<f64> {
    if values.len() <= lag {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations for lag {} autocorrelation",
            lag, lag
        )));
    }
    let m = mean(values)?;
    let denominator: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denominator <= f64::EPSILON {
        return Err(MathError::CalculationError(
            "Autocorrelation is undefined for a constant series".to_string(),
        ));
    }

    let numerator: f64 = values
        .iter()
        .zip(values.iter().skip(lag))
        .map(|(a, b)| (a - m) * (b - m))
        .sum();

    Ok(numerator / denominator)
}

/// Pearson correlation coefficient of two equally long series
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(MathError::InvalidInput(format!(
            "Series lengths differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    if a.len() < 2 {
        return Err(MathError::InsufficientData(
            "Correlation needs at least two observations".to_string(),
        ));
    }

    let mean_a = mean(a)?;
    let mean_b = mean(b)?;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator <= f64::EPSILON {
        return Err(MathError::CalculationError(
            "Correlation is undefined when a series is constant".to_string(),
        ));
    }
    Ok(cov / denominator)
}

/// Apply first differencing `order` times
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        if current.len() < 2 {
            return Vec::new();
        }
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

/// Whether every element equals the first one
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| (v - first).abs() <= f64::EPSILON),
        None => true,
    }
}
