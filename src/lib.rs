//! # Stock Forecast
//!
//! Umbrella crate for the stock price forecasting workspace.
//!
//! - [`math`]: descriptive statistics, least squares and time series tests
//! - [`models`]: the ARIMA, GARCH, LSTM and trailing-trend predictors with
//!   their JSON input and output documents
//!
//! ## Example
//!
//! ```
//! use stock_forecast_workspace::math::z_score;
//!
//! let z = z_score(0.95).unwrap();
//! assert!((z - 1.959964).abs() < 1e-6);
//! ```

pub use forecast_math as math;
pub use forecast_models as models;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;
    use models::runner::ModelType;

    #[test]
    fn test_every_model_type_has_a_predictor() {
        let names: Vec<String> = ModelType::value_variants()
            .iter()
            .filter_map(|model| model.to_possible_value())
            .map(|value| value.get_name().to_string())
            .collect();
        assert_eq!(names, ["arima", "garch", "lstm", "linear"]);
        for model in ModelType::value_variants() {
            assert!(model.executable_name().ends_with("_predictor"));
        }
        assert_eq!(ModelType::from_str("simple", true).unwrap(), ModelType::Linear);
    }

    #[test]
    fn test_reexports() {
        assert_eq!(math::mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
        assert_eq!(models::NAME, "forecast_models");
    }
}
