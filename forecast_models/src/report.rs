//! Output documents written to stdout by the predictors

use crate::error::ForecastError;
use crate::models::arima::ResidualDiagnostics;
use crate::utils::round2;
use chrono::NaiveDate;
use forecast_math::AdfResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// One forecast step with its band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePrediction {
    pub target_date: NaiveDate,
    pub predicted_price: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub confidence_level: f64,
}

impl PricePrediction {
    /// Band centred on `predicted` with half-width `margin`.
    ///
    /// The price and the margin are rounded to cents separately before the
    /// bounds are formed, so the rounded band stays symmetric.
    pub fn symmetric(
        target_date: NaiveDate,
        predicted: f64,
        margin: f64,
        confidence_level: f64,
    ) -> Self {
        let predicted_price = round2(predicted);
        let margin = round2(margin.abs());
        Self {
            target_date,
            predicted_price,
            confidence_lower: round2(predicted_price - margin),
            confidence_upper: round2(predicted_price + margin),
            confidence_level,
        }
    }
}

/// One step of a volatility forecast with the implied price range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityPrediction {
    pub target_date: NaiveDate,
    /// Conditional volatility of percentage returns
    pub predicted_volatility: f64,
    pub price_lower_bound: f64,
    pub price_upper_bound: f64,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArimaModelInfo {
    pub model_type: &'static str,
    pub order: [usize; 3],
    pub aic: f64,
    pub bic: f64,
    pub log_likelihood: f64,
    pub params: BTreeMap<String, f64>,
    /// Unit-root test on the raw prices; `null` when the test could not run
    pub stationarity: Option<AdfResult>,
    pub auto_selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArimaReport {
    pub success: bool,
    pub predictions: Vec<PricePrediction>,
    pub model_info: ArimaModelInfo,
    pub diagnostics: ResidualDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarchParameterReport {
    pub mu: f64,
    pub omega: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    pub persistence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GarchModelInfo {
    pub model_type: &'static str,
    pub order: String,
    pub distribution: &'static str,
    pub aic: f64,
    pub bic: f64,
    pub log_likelihood: f64,
    pub parameters: GarchParameterReport,
    /// `null` whenever the fitted variance process is not covariance stationary
    pub long_run_volatility: Option<f64>,
}

/// Historical Value-at-Risk and expected shortfall of percentage returns
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMetrics {
    #[serde(rename = "VaR_95")]
    pub var_95: f64,
    #[serde(rename = "CVaR_95")]
    pub cvar_95: f64,
    #[serde(rename = "VaR_99")]
    pub var_99: f64,
    #[serde(rename = "CVaR_99")]
    pub cvar_99: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolatilityClustering {
    /// Lag-1 correlation of squared returns
    pub squared_returns_correlation: Option<f64>,
    pub ljung_box_statistic: Option<f64>,
    pub ljung_box_pvalue: Option<f64>,
    pub lags: usize,
    pub has_clustering: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GarchReport {
    pub success: bool,
    pub predictions: Vec<VolatilityPrediction>,
    pub model_info: GarchModelInfo,
    pub risk_metrics: RiskMetrics,
    pub volatility_clustering: VolatilityClustering,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LstmMetrics {
    pub model_type: &'static str,
    pub final_loss: f64,
    pub final_mae: f64,
    pub best_val_loss: Option<f64>,
    pub epochs_trained: usize,
    pub final_learning_rate: f64,
    pub lookback: usize,
    pub units: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LstmReport {
    pub success: bool,
    pub predictions: Vec<PricePrediction>,
    pub metrics: LstmMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearMetrics {
    pub model_type: &'static str,
    pub avg_price: f64,
    pub last_price: f64,
    pub trend: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinearReport {
    pub success: bool,
    pub predictions: Vec<PricePrediction>,
    pub metrics: LinearMetrics,
}

/// Failure output; carries no predictions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    pub error_kind: String,
}

impl FailureReport {
    pub fn new(error: impl Into<String>, error_kind: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_kind: error_kind.into(),
        }
    }
}

impl From<&ForecastError> for FailureReport {
    fn from(err: &ForecastError) -> Self {
        Self::new(err.to_string(), err.kind())
    }
}
