//! Launch a predictor as a child process and relay its document
//!
//! `run_model <model_type> <input-file>` resolves the predictor executable
//! installed next to itself, runs it to completion (or until the optional
//! timeout), forwards the child's stderr, and prints the child's JSON
//! document. A child that dies without a document gets a failure document
//! built from its stderr.

use crate::error::{ForecastError, Result};
use crate::report::FailureReport;
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitCode, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Models a predictor executable exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelType {
    Arima,
    Garch,
    Lstm,
    #[value(alias = "simple")]
    Linear,
}

impl ModelType {
    /// File name of the predictor binary, without platform suffix
    pub fn executable_name(&self) -> &'static str {
        match self {
            ModelType::Arima => "arima_predictor",
            ModelType::Garch => "garch_predictor",
            ModelType::Lstm => "lstm_predictor",
            ModelType::Linear => "linear_predictor",
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Run a forecasting model in a child process")]
pub struct RunModelArgs {
    /// Model to run
    #[arg(value_enum, ignore_case = true)]
    pub model_type: ModelType,
    /// Path to the JSON input document
    pub input: PathBuf,
    /// Kill the predictor after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// What the child left behind
#[derive(Debug)]
pub struct ChildOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Locate the predictor binary in the directory of `current_exe`
pub fn resolve_predictor(current_exe: &Path, model: ModelType) -> Result<PathBuf> {
    let directory = current_exe.parent().ok_or_else(|| {
        ForecastError::Usage(format!(
            "Cannot determine the directory of {}",
            current_exe.display()
        ))
    })?;
    let path = directory.join(format!(
        "{}{}",
        model.executable_name(),
        std::env::consts::EXE_SUFFIX
    ));
    if !path.is_file() {
        return Err(ForecastError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Predictor executable not found: {}", path.display()),
        )));
    }
    Ok(path)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_string(&mut buffer) {
                log::warn!("Failed to read child output: {}", err);
            }
        }
        buffer
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<(Option<ExitStatus>, bool)> {
    let Some(timeout) = timeout else {
        return Ok((Some(child.wait()?), false));
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if started.elapsed() >= timeout {
            log::warn!("Predictor exceeded {:?}; killing it", timeout);
            child.kill()?;
            child.wait()?;
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run `executable input` and collect its output.
///
/// Both pipes are drained while the child runs so a large document cannot
/// block it.
pub fn run_predictor(executable: &Path, input: &Path, timeout: Option<Duration>) -> Result<ChildOutput> {
    log::info!("Running {} {}", executable.display(), input.display());
    let mut child = Command::new(executable)
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let (status, timed_out) = wait_with_timeout(&mut child, timeout)?;

    let join_failed = || ForecastError::ModelError("Output reader thread panicked".to_string());
    Ok(ChildOutput {
        status,
        stdout: stdout.join().map_err(|_| join_failed())?,
        stderr: stderr.join().map_err(|_| join_failed())?,
        timed_out,
    })
}

/// The child's document, if its stdout holds exactly one JSON object
fn json_document(stdout: &str) -> Option<&str> {
    let trimmed = stdout.trim();
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed)
        .ok()
        .map(|_| trimmed)
}

/// Message for a child that produced no document
fn failure_message(output: &ChildOutput, timeout: Option<Duration>) -> String {
    if output.timed_out {
        return format!(
            "Predictor timed out after {} seconds",
            timeout.map_or(0, |t| t.as_secs())
        );
    }
    let last_line = output
        .stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty());
    let status = output
        .status
        .map_or_else(|| "unknown status".to_string(), |s| s.to_string());
    match last_line {
        Some(line) => format!("Predictor failed ({}): {}", status, line),
        None => format!("Predictor failed ({}) without output", status),
    }
}

/// Turn child output into the line to print and whether the run succeeded
pub fn relay(output: &ChildOutput, timeout: Option<Duration>) -> (String, bool) {
    let succeeded = output.status.map_or(false, |s| s.success());
    if !output.timed_out {
        if let Some(document) = json_document(&output.stdout) {
            return (document.to_string(), succeeded);
        }
    }

    let failure = FailureReport::new(failure_message(output, timeout), "model");
    let line = serde_json::to_string(&failure).unwrap_or_else(|_| {
        r#"{"success":false,"error":"Predictor failed","error_kind":"model"}"#.to_string()
    });
    (line, false)
}

fn run(args: &RunModelArgs) -> Result<(String, bool)> {
    let current_exe = std::env::current_exe()?;
    let executable = resolve_predictor(&current_exe, args.model_type)?;
    let timeout = args.timeout_secs.map(Duration::from_secs);
    let output = run_predictor(&executable, &args.input, timeout)?;
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(relay(&output, timeout))
}

/// Entry point of the `run_model` binary
pub fn run_model_cli() -> ExitCode {
    crate::cli::init_logging();
    let args: RunModelArgs = match crate::cli::parse_args() {
        Ok(args) => args,
        Err(err) => return crate::cli::report_failure(&err),
    };
    match run(&args) {
        Ok((line, succeeded)) => {
            println!("{}", line);
            if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => crate::cli::report_failure(&err),
    }
}
