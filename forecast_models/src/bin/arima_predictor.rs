//! ARIMA price predictor: `arima_predictor <input-file>`

use forecast_models::cli::run_cli;
use forecast_models::data::ArimaParams;
use forecast_models::pipeline::run_arima;
use std::process::ExitCode;

fn main() -> ExitCode {
    run_cli::<ArimaParams, _, _>(run_arima)
}
