//! Ordinary least squares regression
//!
//! Used by the augmented Dickey–Fuller test, which needs coefficient
//! t-statistics and information criteria for lag selection. Estimation is
//! delegated to `linregress`; the fit always includes an intercept.

use crate::{MathError, Result};
use linregress::{FormulaRegressionBuilder, RegressionDataBuilder};
use std::f64::consts::PI;

/// Result of an ordinary least squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients: the intercept, then one per regressor
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients
    pub std_errors: Vec<f64>,
    /// Residuals `y - X b`
    pub residuals: Vec<f64>,
    /// Residual sum of squares
    pub ssr: f64,
    /// Number of observations
    pub nobs: usize,
}

impl OlsFit {
    /// Number of estimated coefficients, intercept included
    pub fn n_params(&self) -> usize {
        self.coefficients.len()
    }

    /// t-statistic of the coefficient at `index` (0 is the intercept)
    pub fn t_stat(&self, index: usize) -> Result<f64> {
        let coef = self.coefficients.get(index).ok_or_else(|| {
            MathError::InvalidInput(format!("No coefficient at index {}", index))
        })?;
        let se = self.std_errors[index];
        if se <= 0.0 || !se.is_finite() {
            return Err(MathError::CalculationError(
                "Standard error is zero; t-statistic undefined".to_string(),
            ));
        }
        Ok(coef / se)
    }

    /// Gaussian log-likelihood evaluated at the maximum likelihood variance `ssr / n`
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting one parameter per coefficient
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.n_params() as f64
    }
}

fn regression_error(err: linregress::Error) -> MathError {
    MathError::CalculationError(format!("Least squares fit failed: {}", err))
}

/// Fit `y = b0 + X b + e` by ordinary least squares.
///
/// `regressors` holds one column per explanatory variable, each as long as
/// `y`; the intercept is added here and reported first.
pub fn ols(y: &[f64], regressors: &[Vec<f64>]) -> Result<OlsFit> {
    let nobs = y.len();
    if let Some(column) = regressors.iter().find(|column| column.len() != nobs) {
        return Err(MathError::InvalidInput(format!(
            "Regressor has {} values but response has {}",
            column.len(),
            nobs
        )));
    }
    let k = regressors.len() + 1;
    if nobs <= k {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations to estimate {} coefficients",
            k, k
        )));
    }

    let names: Vec<String> = (1..=regressors.len()).map(|i| format!("X{}", i)).collect();
    let mut columns = vec![("Y".to_string(), y.to_vec())];
    columns.extend(names.iter().cloned().zip(regressors.iter().cloned()));

    let data = RegressionDataBuilder::new()
        .build_from(columns)
        .map_err(regression_error)?;
    let model = FormulaRegressionBuilder::new()
        .data(&data)
        .data_columns("Y", names)
        .fit()
        .map_err(regression_error)?;

    Ok(OlsFit {
        coefficients: model.parameters().to_vec(),
        std_errors: model.se().to_vec(),
        residuals: model.residuals().to_vec(),
        ssr: model.ssr(),
        nobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_is_recovered() {
        // y = 1 + 2x with a small alternating disturbance
        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, x)| 1.0 + 2.0 * x + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let fit = ols(&y, &[x]).unwrap();

        assert_eq!(fit.n_params(), 2);
        assert_relative_eq!(fit.coefficients[0], 1.0, epsilon = 0.02);
        assert_relative_eq!(fit.coefficients[1], 2.0, epsilon = 0.01);
        assert!(fit.ssr < 0.01);
        assert_eq!(fit.nobs, 12);
    }

    #[test]
    fn test_noisy_fit_has_standard_errors() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.1, 1.9, 3.2, 3.8, 5.1, 6.0];
        let fit = ols(&y, &[x]).unwrap();

        assert!(fit.std_errors.iter().all(|se| *se > 0.0));
        assert!(fit.t_stat(1).unwrap() > 10.0);
        let residual_sum: f64 = fit.residuals.iter().sum();
        assert_relative_eq!(residual_sum, 0.0, epsilon = 1e-10);
        assert!(fit.t_stat(2).is_err());
    }

    #[test]
    fn test_mismatched_columns_are_rejected() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let x = vec![1.0, 2.0, 3.0];
        assert!(matches!(ols(&y, &[x]), Err(MathError::InvalidInput(_))));
    }

    #[test]
    fn test_too_few_observations() {
        let y = [0.0, 1.0];
        let x = vec![0.0, 1.0];
        assert!(matches!(ols(&y, &[x]), Err(MathError::InsufficientData(_))));
    }
}
