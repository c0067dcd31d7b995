//! # Forecast Math
//!
//! Statistical building blocks used by the forecasting models.
//! This crate provides descriptive statistics, ordinary least squares and the
//! time series tests (unit root, stationarity, serial correlation) that the
//! price and volatility predictors report on.

use thiserror::Error;

pub mod descriptive;
pub mod diagnostics;
pub mod normal;
pub mod regression;
pub mod stationarity;

pub use descriptive::{
    autocorrelation, difference, excess_kurtosis, is_constant, mean, pearson_correlation, percentile,
    skewness, std_dev, variance,
};
pub use diagnostics::{ljung_box, LjungBox};
pub use normal::{normal_cdf, z_score};
pub use regression::{ols, OlsFit};
pub use stationarity::{adf_test, kpss_test, AdfResult, KpssResult};

/// Errors that can occur in statistical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for statistical operations
pub type Result<T> = std::result::Result<T, MathError>;
