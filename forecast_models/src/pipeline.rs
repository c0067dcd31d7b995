//! End-to-end runs: validated input in, output document out
//!
//! Each `run_*` function fits one model on the input prices, forecasts the
//! requested horizon and assembles the success document, rounding values the
//! way they are reported.

use crate::data::{ArimaParams, GarchParams, LinearParams, LstmParams, PredictionInput};
use crate::error::{ForecastError, Result};
use crate::metrics::risk_metrics;
use crate::models::arima::ArimaModel;
use crate::models::garch::GarchModel;
use crate::models::linear::LinearTrendModel;
use crate::models::lstm::LstmModel;
use crate::models::{ForecastModel, ForecastResult, Predictor};
use crate::report::{
    ArimaModelInfo, ArimaReport, GarchModelInfo, GarchParameterReport, GarchReport, LinearMetrics,
    LinearReport, LstmMetrics, LstmReport, PricePrediction, VolatilityPrediction,
};
use crate::utils::{finite, future_dates, round2, round_to};
use crate::volatility::{clustering_test, percentage_log_returns};
use forecast_math::z_score;

fn last_price(prices: &[f64]) -> Result<f64> {
    prices
        .last()
        .copied()
        .ok_or_else(|| ForecastError::ValidationError("Price series is empty".to_string()))
}

fn rounded(values: &[f64], decimals: i32) -> Vec<f64> {
    values.iter().map(|v| round_to(*v, decimals)).collect()
}

/// Fit `model` and forecast the input horizon
fn fit_and_forecast<M, P>(
    model: M,
    input: &PredictionInput<P>,
) -> Result<(Predictor<M>, ForecastResult)>
where
    M: ForecastModel,
{
    input.validate()?;
    let mut predictor = Predictor::new(model);
    predictor.fit(&input.prices)?;
    let forecast = predictor.forecast(input.prediction_days)?;
    Ok((predictor, forecast))
}

/// Zip forecast values and margins into dated symmetric bands
fn price_predictions<P>(
    input: &PredictionInput<P>,
    values: &[f64],
    margins: &[f64],
) -> Result<Vec<PricePrediction>> {
    let dates = future_dates(input.base_date, values.len())?;
    Ok(dates
        .into_iter()
        .zip(values.iter().zip(margins))
        .map(|(date, (value, margin))| {
            PricePrediction::symmetric(date, *value, *margin, input.confidence_level)
        })
        .collect())
}

/// ARIMA price forecast with residual diagnostics
pub fn run_arima(input: &PredictionInput<ArimaParams>) -> Result<ArimaReport> {
    let model = ArimaModel::from_params(&input.params)?;
    let (predictor, forecast) = fit_and_forecast(model, input)?;
    let trained = predictor.trained()?;
    log::info!(
        "Selected {} (aic {:.2}, {} candidate fits)",
        trained.order(),
        trained.aic(),
        trained.candidate_fits()
    );

    let margins = forecast.margins(input.confidence_level)?;
    let predictions = price_predictions(input, forecast.values(), &margins)?;

    Ok(ArimaReport {
        success: true,
        predictions,
        model_info: ArimaModelInfo {
            model_type: ArimaModel::MODEL_TYPE,
            order: trained.order().as_array(),
            aic: round2(trained.aic()),
            bic: round2(trained.bic()),
            log_likelihood: round2(trained.log_likelihood()),
            params: trained
                .params()
                .into_iter()
                .map(|(name, value)| (name, round_to(value, 4)))
                .collect(),
            stationarity: trained.stationarity().cloned(),
            auto_selected: trained.auto_selected(),
        },
        diagnostics: trained.residual_diagnostics(),
    })
}

/// GARCH volatility forecast with implied price ranges and risk metrics
pub fn run_garch(input: &PredictionInput<GarchParams>) -> Result<GarchReport> {
    input.validate()?;
    let returns = percentage_log_returns(&input.prices)?;
    let model = GarchModel::from_params(&input.params)?;
    let (predictor, forecast) = fit_and_forecast(model, input)?;
    let trained = predictor.trained()?;
    let params = trained.parameters();
    if !trained.converged() {
        log::warn!("GARCH optimizer stopped before converging");
    }

    let current = last_price(&input.prices)?;
    let z = z_score(input.confidence_level)?;
    let dates = future_dates(input.base_date, forecast.horizons())?;
    let predictions = dates
        .into_iter()
        .zip(forecast.values())
        .enumerate()
        .map(|(step, (target_date, volatility))| {
            let band = z * current * (volatility / 100.0) * ((step + 1) as f64).sqrt();
            VolatilityPrediction {
                target_date,
                predicted_volatility: round_to(*volatility, 4),
                price_lower_bound: round2(current - band),
                price_upper_bound: round2(current + band),
                confidence_level: input.confidence_level,
            }
        })
        .collect();

    Ok(GarchReport {
        success: true,
        predictions,
        model_info: GarchModelInfo {
            model_type: GarchModel::MODEL_TYPE,
            order: trained.order_label(),
            distribution: trained.distribution().as_str(),
            aic: round2(trained.aic()),
            bic: round2(trained.bic()),
            log_likelihood: round2(trained.log_likelihood()),
            parameters: GarchParameterReport {
                mu: round_to(params.mu, 6),
                omega: round_to(params.omega, 6),
                alpha: rounded(&params.alpha, 6),
                beta: rounded(&params.beta, 6),
                persistence: round_to(params.persistence(), 6),
                nu: params.nu.map(|nu| round_to(nu, 4)),
                lambda: params.lambda.map(|lambda| round_to(lambda, 4)),
            },
            long_run_volatility: params.long_run_volatility().map(|v| round_to(v, 4)),
        },
        risk_metrics: risk_metrics(&returns)?,
        volatility_clustering: clustering_test(&returns),
    })
}

/// LSTM price forecast with training metrics
pub fn run_lstm(input: &PredictionInput<LstmParams>) -> Result<LstmReport> {
    let model = LstmModel::new(&input.params)?;
    let (predictor, forecast) = fit_and_forecast(model, input)?;
    let trained = predictor.trained()?;
    let history = trained.history();

    let margins = forecast.margins(input.confidence_level)?;
    let predictions = price_predictions(input, forecast.values(), &margins)?;

    let missing = || ForecastError::ModelError("Training produced no epochs".to_string());
    Ok(LstmReport {
        success: true,
        predictions,
        metrics: LstmMetrics {
            model_type: LstmModel::MODEL_TYPE,
            final_loss: round_to(history.final_loss().ok_or_else(missing)?, 6),
            final_mae: round_to(history.final_mae().ok_or_else(missing)?, 4),
            best_val_loss: history.best_val_loss().and_then(finite).map(|v| round_to(v, 6)),
            epochs_trained: history.epochs_trained(),
            final_learning_rate: history.final_learning_rate().ok_or_else(missing)?,
            lookback: trained.lookback(),
            units: trained.units(),
            seed: trained.seed(),
        },
    })
}

/// Trailing-trend fallback forecast
pub fn run_linear(input: &PredictionInput<LinearParams>) -> Result<LinearReport> {
    let model = LinearTrendModel::from_params(&input.params)?;
    let (predictor, forecast) = fit_and_forecast(model, input)?;
    let trained = predictor.trained()?;

    let margins: Vec<f64> = forecast.values().iter().map(|v| trained.margin(*v)).collect();
    let predictions = price_predictions(input, forecast.values(), &margins)?;

    Ok(LinearReport {
        success: true,
        predictions,
        metrics: LinearMetrics {
            model_type: LinearTrendModel::MODEL_TYPE,
            avg_price: round2(trained.average()),
            last_price: round2(trained.last()),
            trend: round_to(trained.trend(), 4),
            data_points: trained.data_points(),
        },
    })
}
