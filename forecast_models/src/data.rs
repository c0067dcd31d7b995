//! Input documents for the predictors
//!
//! Every predictor reads one JSON document holding the price history, the
//! base date and the horizon, plus model-specific parameters flattened into
//! the same object. Unknown fields are ignored; missing optional fields fall
//! back to the defaults below.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default forecast horizon in days
pub const DEFAULT_PREDICTION_DAYS: usize = 7;
/// Longest accepted forecast horizon in days
pub const MAX_PREDICTION_DAYS: usize = 365;
/// Default confidence level of prediction bands
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

fn default_prediction_days() -> usize {
    DEFAULT_PREDICTION_DAYS
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

/// A prediction request: common fields plus model parameters `P`
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionInput<P> {
    /// Historical prices in chronological order
    pub prices: Vec<f64>,
    /// Date the forecast dates are offset from
    pub base_date: NaiveDate,
    /// Forecast horizon in days
    #[serde(default = "default_prediction_days")]
    pub prediction_days: usize,
    /// Confidence level of the prediction bands
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Model-specific parameters
    #[serde(flatten)]
    pub params: P,
}

impl<P> PredictionInput<P> {
    /// Check the fields shared by every predictor
    pub fn validate(&self) -> Result<()> {
        if self.prices.is_empty() {
            return Err(ForecastError::ValidationError(
                "Price series is empty".to_string(),
            ));
        }
        if let Some(position) = self.prices.iter().position(|p| !p.is_finite()) {
            return Err(ForecastError::ValidationError(format!(
                "Price at index {} is not a finite number",
                position
            )));
        }
        if self.prediction_days == 0 || self.prediction_days > MAX_PREDICTION_DAYS {
            return Err(ForecastError::InvalidParameter(format!(
                "prediction_days must be between 1 and {}, got {}",
                MAX_PREDICTION_DAYS, self.prediction_days
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "confidence_level must be between 0 and 1, got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// ARIMA order request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArimaParams {
    /// Autoregressive order
    #[serde(default)]
    pub p: Option<usize>,
    /// Differencing order
    #[serde(default)]
    pub d: Option<usize>,
    /// Moving-average order
    #[serde(default)]
    pub q: Option<usize>,
    /// Search the order automatically; also implied when any of p, d, q is missing
    #[serde(default = "default_true")]
    pub auto_select: bool,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self {
            p: None,
            d: None,
            q: None,
            auto_select: true,
        }
    }
}

impl ArimaParams {
    /// The explicit order, if the caller fixed all three terms and disabled the search
    pub fn fixed_order(&self) -> Option<(usize, usize, usize)> {
        if self.auto_select {
            return None;
        }
        match (self.p, self.d, self.q) {
            (Some(p), Some(d), Some(q)) => Some((p, d, q)),
            _ => None,
        }
    }
}

/// Error distribution of the GARCH innovations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Standard normal
    #[default]
    #[serde(alias = "gaussian")]
    Normal,
    /// Standardised Student's t
    #[serde(alias = "studentst", alias = "student_t")]
    T,
    /// Hansen's skewed Student's t
    #[serde(alias = "skew_t", alias = "skewstudent")]
    SkewT,
}

impl Distribution {
    /// Name as reported in the output document
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Normal => "normal",
            Distribution::T => "t",
            Distribution::SkewT => "skewt",
        }
    }
}

fn default_garch_order() -> usize {
    1
}

/// GARCH order and innovation distribution
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GarchParams {
    /// Number of ARCH (lagged squared shock) terms
    #[serde(default = "default_garch_order")]
    pub p: usize,
    /// Number of GARCH (lagged variance) terms
    #[serde(default = "default_garch_order")]
    pub q: usize,
    /// Innovation distribution
    #[serde(default)]
    pub dist: Distribution,
}

impl Default for GarchParams {
    fn default() -> Self {
        Self {
            p: 1,
            q: 1,
            dist: Distribution::Normal,
        }
    }
}

fn default_lookback() -> usize {
    60
}
fn default_units() -> usize {
    128
}
fn default_epochs() -> usize {
    100
}
fn default_dropout() -> f64 {
    0.2
}
fn default_batch_size() -> usize {
    32
}
fn default_learning_rate() -> f64 {
    0.001
}
fn default_validation_split() -> f64 {
    0.2
}

/// LSTM network and training configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LstmParams {
    /// Window length fed to the network
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Width of the first recurrent layer
    #[serde(default = "default_units")]
    pub units: usize,
    /// Maximum number of training epochs
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Fraction of windows held out (chronologically last) for validation
    #[serde(default = "default_validation_split")]
    pub validation_split: f64,
    /// Seed for initialisation, dropout and shuffling; drawn from entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LstmParams {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            units: default_units(),
            epochs: default_epochs(),
            dropout: default_dropout(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            validation_split: default_validation_split(),
            seed: None,
        }
    }
}

fn default_band_fraction() -> f64 {
    0.05
}

/// Fallback estimator configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearParams {
    /// Half-width of the band as a fraction of the predicted price
    #[serde(default = "default_band_fraction")]
    pub band_fraction: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            band_fraction: default_band_fraction(),
        }
    }
}

/// Parse an input document, tolerating a leading UTF-8 byte order mark
pub fn parse_input<P>(content: &str) -> Result<PredictionInput<P>>
where
    P: for<'de> Deserialize<'de>,
{
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let input: PredictionInput<P> = serde_json::from_str(content)?;
    input.validate()?;
    Ok(input)
}

/// Read and parse an input document from a file
pub fn read_input<P, Q>(path: Q) -> Result<PredictionInput<P>>
where
    P: for<'de> Deserialize<'de>,
    Q: AsRef<Path>,
{
    let content = fs::read_to_string(path)?;
    parse_input(&content)
}
