//! Return series and volatility clustering

use crate::error::{ForecastError, Result};
use crate::report::VolatilityClustering;
use forecast_math::{ljung_box, pearson_correlation};

/// Lags used by the squared-return Ljung–Box test
pub const CLUSTERING_LAGS: usize = 10;
/// Significance level of the clustering test
pub const CLUSTERING_ALPHA: f64 = 0.05;

/// Percentage log returns, `100 · diff(ln p)`
pub fn percentage_log_returns(prices: &[f64]) -> Result<Vec<f64>> {
    if prices.len() < 2 {
        return Err(ForecastError::ValidationError(
            "At least two prices are needed to compute returns".to_string(),
        ));
    }
    if let Some(position) = prices.iter().position(|p| *p <= 0.0) {
        return Err(ForecastError::ValidationError(format!(
            "Log returns need positive prices; price at index {} is {}",
            position, prices[position]
        )));
    }

    Ok(prices
        .windows(2)
        .map(|w| 100.0 * (w[1].ln() - w[0].ln()))
        .collect())
}

/// Test squared returns for serial correlation.
///
/// Clustering is declared when the Ljung–Box test on squared returns rejects
/// at 5%. The lag-1 correlation of squared returns is reported alongside; any
/// statistic that is undefined for the series (e.g. constant returns) is `None`
/// and the series is then reported as unclustered.
pub fn clustering_test(returns: &[f64]) -> VolatilityClustering {
    let squared: Vec<f64> = returns.iter().map(|r| r * r).collect();

    let squared_returns_correlation = if squared.len() > 2 {
        pearson_correlation(&squared[..squared.len() - 1], &squared[1..])
            .ok()
            .filter(|c| c.is_finite())
    } else {
        None
    };

    let test = ljung_box(&squared, CLUSTERING_LAGS, 0)
        .map_err(|e| log::debug!("Squared-return Ljung-Box test skipped: {}", e))
        .ok()
        .filter(|t| t.statistic.is_finite() && t.p_value.is_finite());

    VolatilityClustering {
        squared_returns_correlation,
        ljung_box_statistic: test.map(|t| t.statistic),
        ljung_box_pvalue: test.map(|t| t.p_value),
        lags: CLUSTERING_LAGS,
        has_clustering: test.map_or(false, |t| t.p_value < CLUSTERING_ALPHA),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_percentage_log_returns() {
        let returns = percentage_log_returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(returns.len(), 2);
        assert_abs_diff_eq!(returns[0], 100.0 * (1.1f64).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(returns[1], 100.0 * (0.9f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_prices_are_rejected() {
        assert!(matches!(
            percentage_log_returns(&[100.0, 0.0, 101.0]),
            Err(ForecastError::ValidationError(_))
        ));
        assert!(percentage_log_returns(&[100.0]).is_err());
    }

    #[test]
    fn test_clustered_returns_are_detected() {
        // Calm and turbulent regimes alternating every 20 observations
        let returns: Vec<f64> = (0..200)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                let scale = if (i / 20) % 2 == 0 { 0.2 } else { 3.0 };
                sign * scale
            })
            .collect();
        let result = clustering_test(&returns);
        assert!(result.has_clustering);
        assert!(result.squared_returns_correlation.unwrap() > 0.5);
        assert_eq!(result.lags, 10);
    }

    #[test]
    fn test_constant_returns_are_unclustered() {
        let result = clustering_test(&[0.5; 50]);
        assert!(!result.has_clustering);
        assert_eq!(result.squared_returns_correlation, None);
    }
}
