//! # Forecast Models
//!
//! Stock price forecasting as one-shot JSON command-line tools.
//!
//! ## Features
//!
//! - ARIMA price forecasts with automatic order selection
//! - GARCH volatility forecasts with historical VaR/CVaR and clustering tests
//! - LSTM price forecasts trained with Adam and early stopping
//! - A trailing-trend fallback estimator with no fitting at all
//! - `run_model`, which runs any predictor in a child process
//!
//! Every predictor reads one JSON document and prints one JSON document:
//! a success document with `predictions`, or `{success: false, error,
//! error_kind}` with exit code 1.
//!
//! ## Quick Start
//!
//! ```rust
//! use forecast_models::data::{parse_input, LinearParams};
//! use forecast_models::pipeline::run_linear;
//!
//! let input = parse_input::<LinearParams>(
//!     r#"{"prices": [100, 101, 102, 103, 104, 105, 106, 107, 108, 109],
//!         "base_date": "2024-01-01", "prediction_days": 3}"#,
//! )?;
//! let report = run_linear(&input)?;
//! assert_eq!(report.predictions[0].predicted_price, 110.0);
//! # Ok::<(), forecast_models::ForecastError>(())
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod optimization;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod utils;
pub mod volatility;

// Re-export commonly used types
pub use crate::data::PredictionInput;
pub use crate::error::ForecastError;
pub use crate::models::{ForecastModel, ForecastResult, Predictor, TrainedForecastModel};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
