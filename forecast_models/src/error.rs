//! Error types for the forecast_models crate

use forecast_math::MathError;
use thiserror::Error;

/// Custom error types for the forecast_models crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing or malformed invocation arguments
    #[error("Usage error: {0}")]
    Usage(String),

    /// Price series shorter than the model minimum
    #[error("Insufficient data: {model} needs at least {required} prices, got {actual}")]
    InsufficientData {
        model: &'static str,
        required: usize,
        actual: usize,
    },

    /// Error related to input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Forecast requested from a model that has not been fitted
    #[error("Model has not been fitted; call fit before forecast")]
    NotFitted,

    /// Fit requested on a model that is already fitted
    #[error("Model is already fitted")]
    AlreadyFitted,

    /// Error raised while fitting or forecasting
    #[error("Model error: {0}")]
    ModelError(String),

    /// Numerical optimizer failure
    #[error("Optimization error: {0}")]
    OptimizationError(String),

    /// Error from statistical calculations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("Invalid JSON input: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ForecastError {
    /// Stable category name carried in the failure document
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::Usage(_) | ForecastError::NotFitted | ForecastError::AlreadyFitted => {
                "usage"
            }
            ForecastError::InsufficientData { .. }
            | ForecastError::ValidationError(_)
            | ForecastError::InvalidParameter(_) => "validation",
            ForecastError::ModelError(_)
            | ForecastError::OptimizationError(_)
            | ForecastError::MathError(_) => "model",
            ForecastError::IoError(_) => "io",
            ForecastError::JsonError(_) => "input",
        }
    }
}

impl From<argmin::core::Error> for ForecastError {
    fn from(err: argmin::core::Error) -> Self {
        ForecastError::OptimizationError(err.to_string())
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ForecastError::Usage("x".into()).kind(), "usage");
        assert_eq!(ForecastError::NotFitted.kind(), "usage");
        let short = ForecastError::InsufficientData {
            model: "ARIMA",
            required: 30,
            actual: 29,
        };
        assert_eq!(short.kind(), "validation");
        assert_eq!(ForecastError::ModelError("x".into()).kind(), "model");
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ForecastError::from(json).kind(), "input");
    }

    #[test]
    fn test_error_display() {
        let short = ForecastError::InsufficientData {
            model: "GARCH",
            required: 100,
            actual: 99,
        };
        let message = short.to_string();
        assert!(message.contains("GARCH"));
        assert!(message.contains("100"));
        assert!(message.contains("99"));

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = ForecastError::from(io_error);
        assert!(error.to_string().contains("IO error"));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_math_error_conversion() {
        let error = ForecastError::from(MathError::InvalidInput("bad".to_string()));
        assert!(matches!(error, ForecastError::MathError(_)));
        assert_eq!(error.kind(), "model");
    }
}
