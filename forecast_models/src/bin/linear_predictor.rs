//! Trailing-trend fallback predictor: `linear_predictor <input-file>`

use forecast_models::cli::run_cli;
use forecast_models::data::LinearParams;
use forecast_models::pipeline::run_linear;
use std::process::ExitCode;

fn main() -> ExitCode {
    run_cli::<LinearParams, _, _>(run_linear)
}
