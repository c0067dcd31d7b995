//! Shared command-line plumbing for the predictor binaries
//!
//! A predictor is invoked as `<predictor> <input-file>`. Whatever happens,
//! exactly one JSON document is written to stdout: the success document of
//! the pipeline, or a failure document with `success: false`. Logs go to
//! stderr so they never mix with the document.

use crate::data::{read_input, PredictionInput};
use crate::error::{ForecastError, Result};
use crate::report::FailureReport;
use clap::error::ErrorKind;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments common to every predictor
#[derive(Debug, Parser)]
#[command(version, about = "Fit a forecasting model to a JSON price history")]
pub struct PredictorArgs {
    /// Path to the JSON input document
    pub input: PathBuf,
}

/// Route `log` output to stderr; `RUST_LOG` overrides the default `info` level
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // A second initialisation (e.g. from tests) is harmless
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Parse command-line arguments, turning parse failures into usage errors.
///
/// `--help` and `--version` print their text and exit the process directly.
pub fn parse_args<A: Parser>() -> Result<A> {
    A::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => ForecastError::Usage(err.render().to_string().trim().to_string()),
    })
}

/// Write one JSON document as a single stdout line
pub fn print_document<T: Serialize>(document: &T) -> Result<()> {
    let line = serde_json::to_string(document)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", line)?;
    handle.flush()?;
    Ok(())
}

/// Print the failure document for `err` and return the failing exit code
pub fn report_failure(err: &ForecastError) -> ExitCode {
    log::error!("{}", err);
    if let Err(print_err) = print_document(&FailureReport::from(err)) {
        log::error!("Could not write failure document: {}", print_err);
    }
    ExitCode::FAILURE
}

fn run<P, R, F>(pipeline: F) -> Result<R>
where
    P: for<'de> Deserialize<'de>,
    F: FnOnce(&PredictionInput<P>) -> Result<R>,
{
    let args: PredictorArgs = parse_args()?;
    log::debug!("Reading input from {}", args.input.display());
    let input = read_input::<P, _>(&args.input)?;
    log::info!(
        "Forecasting {} days from {} prices",
        input.prediction_days,
        input.prices.len()
    );
    pipeline(&input)
}

/// Entry point of a predictor binary.
///
/// Reads the input file named on the command line, runs `pipeline` on it and
/// prints the resulting document. Returns exit code 0 on success and 1 on any
/// failure.
pub fn run_cli<P, R, F>(pipeline: F) -> ExitCode
where
    P: for<'de> Deserialize<'de>,
    R: Serialize,
    F: FnOnce(&PredictionInput<P>) -> Result<R>,
{
    init_logging();
    match run(pipeline).and_then(|report| print_document(&report)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_is_usage_error() {
        let err = PredictorArgs::try_parse_from(["arima_predictor"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_input_path_is_positional() {
        let args = PredictorArgs::try_parse_from(["garch_predictor", "/tmp/input.json"]).unwrap();
        assert_eq!(args.input, PathBuf::from("/tmp/input.json"));
    }

    #[test]
    fn test_failure_document_is_single_json_object() {
        let err = ForecastError::Usage("missing input file".to_string());
        let line = serde_json::to_string(&FailureReport::from(&err)).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["error_kind"], "usage");
    }
}
