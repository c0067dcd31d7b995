//! Runs a predictor in a child process: `run_model <model_type> <input-file> [--timeout-secs N]`

use std::process::ExitCode;

fn main() -> ExitCode {
    forecast_models::runner::run_model_cli()
}
