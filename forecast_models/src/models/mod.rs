//! Forecasting models for price series
//!
//! Every model follows the same two-stage shape: an untrained configuration
//! implementing [`ForecastModel`] is trained on a price history and yields a
//! [`TrainedForecastModel`] that can be asked for forecasts. [`Predictor`]
//! wraps the pair in a small state machine so a caller cannot forecast before
//! fitting, or fit twice.

use crate::error::{ForecastError, Result};
use forecast_math::z_score;
use std::fmt::Debug;

/// Forecast result containing predicted values
#[derive(Debug, Clone)]
pub struct ForecastResult {
    /// Forecasted values
    pub(crate) values: Vec<f64>,
    /// Number of periods forecasted
    horizons: usize,
    /// Standard error of each forecast step (optional)
    pub(crate) std_errors: Option<Vec<f64>>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, horizons: usize) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        Ok(Self {
            values,
            horizons,
            std_errors: None,
        })
    }

    /// Create a new forecast result with per-step standard errors
    pub fn new_with_std_errors(
        values: Vec<f64>,
        horizons: usize,
        std_errors: Vec<f64>,
    ) -> Result<Self> {
        let mut result = Self::new(values, horizons)?;

        if std_errors.len() != horizons {
            return Err(ForecastError::ValidationError(format!(
                "Values length ({}) doesn't match standard errors length ({})",
                horizons,
                std_errors.len()
            )));
        }
        if std_errors.iter().any(|se| !se.is_finite() || *se < 0.0) {
            return Err(ForecastError::ModelError(
                "Forecast standard errors must be finite and non-negative".to_string(),
            ));
        }

        result.std_errors = Some(std_errors);
        Ok(result)
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Get the standard errors, if available
    pub fn std_errors(&self) -> Option<&[f64]> {
        self.std_errors.as_deref()
    }

    /// Half-width of the two-sided normal band at each step
    pub fn margins(&self, confidence_level: f64) -> Result<Vec<f64>> {
        let std_errors = self.std_errors.as_ref().ok_or_else(|| {
            ForecastError::ModelError("Forecast carries no standard errors".to_string())
        })?;
        let z = z_score(confidence_level).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        Ok(std_errors.iter().map(|se| z * se).collect())
    }

    /// Generate confidence intervals for the forecast
    pub fn confidence_intervals(&self, confidence_level: f64) -> Result<Vec<(f64, f64)>> {
        let margins = self.margins(confidence_level)?;
        Ok(self
            .values
            .iter()
            .zip(margins)
            .map(|(v, m)| (v - m, v + m))
            .collect())
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> String;
}

/// Forecast model that can be trained on a price series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Identifier reported in output documents and errors
    const MODEL_TYPE: &'static str;

    /// Train the model on a price series
    fn train(&self, prices: &[f64]) -> Result<Self::Trained>;

    /// Fewest prices the model accepts
    fn min_observations(&self) -> usize;

    /// Get the name of the model
    fn name(&self) -> String;
}

/// Fit-once, forecast-many wrapper around a model
#[derive(Debug)]
pub struct Predictor<M: ForecastModel> {
    model: M,
    trained: Option<M::Trained>,
}

impl<M: ForecastModel> Predictor<M> {
    /// Create an unfitted predictor
    pub fn new(model: M) -> Self {
        Self {
            model,
            trained: None,
        }
    }

    /// The untrained configuration
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn is_fitted(&self) -> bool {
        self.trained.is_some()
    }

    /// Fit the model; a predictor can only be fitted once
    pub fn fit(&mut self, prices: &[f64]) -> Result<&M::Trained> {
        if self.trained.is_some() {
            return Err(ForecastError::AlreadyFitted);
        }

        let required = self.model.min_observations();
        if prices.len() < required {
            return Err(ForecastError::InsufficientData {
                model: M::MODEL_TYPE,
                required,
                actual: prices.len(),
            });
        }

        log::debug!("Fitting {} on {} prices", self.model.name(), prices.len());
        let trained = self.model.train(prices)?;
        Ok(self.trained.insert(trained))
    }

    /// The fitted model
    pub fn trained(&self) -> Result<&M::Trained> {
        self.trained.as_ref().ok_or(ForecastError::NotFitted)
    }

    /// Forecast `horizons` steps past the end of the fitted series
    pub fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        if horizons == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least 1".to_string(),
            ));
        }
        self.trained()?.forecast(horizons)
    }
}

pub mod arima;
pub mod garch;
pub mod linear;
pub mod lstm;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Debug, Clone)]
    struct LastValue;

    #[derive(Debug)]
    struct TrainedLastValue(f64);

    impl TrainedForecastModel for TrainedLastValue {
        fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
            ForecastResult::new_with_std_errors(vec![self.0; horizons], horizons, vec![1.0; horizons])
        }

        fn name(&self) -> String {
            "last value".to_string()
        }
    }

    impl ForecastModel for LastValue {
        type Trained = TrainedLastValue;
        const MODEL_TYPE: &'static str = "LAST";

        fn train(&self, prices: &[f64]) -> Result<Self::Trained> {
            prices
                .last()
                .map(|p| TrainedLastValue(*p))
                .ok_or_else(|| ForecastError::ValidationError("empty".to_string()))
        }

        fn min_observations(&self) -> usize {
            3
        }

        fn name(&self) -> String {
            "last value".to_string()
        }
    }

    #[test]
    fn test_forecast_before_fit_is_rejected() {
        let predictor = Predictor::new(LastValue);
        assert!(!predictor.is_fitted());
        assert!(matches!(predictor.forecast(3), Err(ForecastError::NotFitted)));
    }

    #[test]
    fn test_fit_then_forecast() {
        let mut predictor = Predictor::new(LastValue);
        predictor.fit(&[1.0, 2.0, 3.0]).unwrap();
        assert!(predictor.is_fitted());
        let forecast = predictor.forecast(4).unwrap();
        assert_eq!(forecast.values(), &[3.0; 4]);
        assert_eq!(forecast.horizons(), 4);
    }

    #[test]
    fn test_second_fit_is_rejected() {
        let mut predictor = Predictor::new(LastValue);
        predictor.fit(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            predictor.fit(&[1.0, 2.0, 3.0]),
            Err(ForecastError::AlreadyFitted)
        ));
    }

    #[test]
    fn test_short_series_is_rejected_with_minimum() {
        let mut predictor = Predictor::new(LastValue);
        match predictor.fit(&[1.0, 2.0]) {
            Err(ForecastError::InsufficientData {
                model,
                required,
                actual,
            }) => {
                assert_eq!(model, "LAST");
                assert_eq!(required, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!predictor.is_fitted());
    }

    #[test]
    fn test_confidence_intervals_use_normal_quantile() {
        let result =
            ForecastResult::new_with_std_errors(vec![10.0, 20.0], 2, vec![1.0, 2.0]).unwrap();
        let intervals = result.confidence_intervals(0.95).unwrap();
        assert_relative_eq!(intervals[0].0, 10.0 - 1.959964, epsilon = 1e-5);
        assert_relative_eq!(intervals[1].1, 20.0 + 2.0 * 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        assert!(ForecastResult::new(vec![1.0, 2.0], 3).is_err());
        assert!(ForecastResult::new_with_std_errors(vec![1.0], 1, vec![1.0, 2.0]).is_err());
        assert!(ForecastResult::new_with_std_errors(vec![1.0], 1, vec![f64::NAN]).is_err());
        assert!(ForecastResult::new(vec![1.0], 1).unwrap().margins(0.95).is_err());
    }
}
