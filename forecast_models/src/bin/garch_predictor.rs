//! GARCH volatility predictor: `garch_predictor <input-file>`

use forecast_models::cli::run_cli;
use forecast_models::data::GarchParams;
use forecast_models::pipeline::run_garch;
use std::process::ExitCode;

fn main() -> ExitCode {
    run_cli::<GarchParams, _, _>(run_garch)
}
