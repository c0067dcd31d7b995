//! LSTM price predictor: `lstm_predictor <input-file>`

use forecast_models::cli::run_cli;
use forecast_models::data::LstmParams;
use forecast_models::pipeline::run_lstm;
use std::process::ExitCode;

fn main() -> ExitCode {
    run_cli::<LstmParams, _, _>(run_lstm)
}
