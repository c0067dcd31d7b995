use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn write_input(document: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", document).unwrap();
    file
}

fn prices(n: usize) -> Vec<f64> {
    let mut price = 50.0;
    (0..n)
        .map(|i| {
            let shock = 0.012 * (i as f64 * 2.3).sin() + 0.006 * (i as f64 * 0.71).cos();
            price *= 1.0 + shock + 0.0005;
            (price * 100.0).round() / 100.0
        })
        .collect()
}

fn input_for(n: usize, extra: Value) -> NamedTempFile {
    let mut document = json!({
        "prices": prices(n),
        "base_date": "2024-06-28",
        "stock_id": 2330
    });
    if let (Some(target), Some(extra)) = (document.as_object_mut(), extra.as_object()) {
        target.extend(extra.clone());
    }
    write_input(&document.to_string())
}

fn run(binary: &str, args: &[&str]) -> Output {
    Command::new(binary)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

/// Stdout must be exactly one JSON object on one line
fn document(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    assert_eq!(stdout.trim_end().lines().count(), 1, "stdout: {}", stdout);
    serde_json::from_str(stdout.trim()).unwrap()
}

fn assert_failure(output: &Output) -> Value {
    assert_eq!(output.status.code(), Some(1));
    let value = document(output);
    assert_eq!(value["success"], json!(false));
    assert!(!value["error"].as_str().unwrap().is_empty());
    assert!(value.get("predictions").is_none());
    value
}

fn assert_symmetric(predictions: &[Value]) {
    for prediction in predictions {
        let price = prediction["predicted_price"].as_f64().unwrap();
        let lower = prediction["confidence_lower"].as_f64().unwrap();
        let upper = prediction["confidence_upper"].as_f64().unwrap();
        assert!(((price - lower) - (upper - price)).abs() < 1e-6, "{}", prediction);
    }
}

#[test]
fn test_arima_predictor_success() {
    let input = input_for(60, json!({}));
    let output = run(env!("CARGO_BIN_EXE_arima_predictor"), &[input.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let value = document(&output);
    assert_eq!(value["success"], json!(true));
    let predictions = value["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 7);
    assert_eq!(predictions[0]["target_date"], json!("2024-06-29"));
    assert_symmetric(predictions);
    assert_eq!(value["model_info"]["model_type"], json!("ARIMA"));
    assert_eq!(value["model_info"]["order"].as_array().unwrap().len(), 3);
    assert!(value["diagnostics"].get("ljung_box_pvalue").is_some());
}

#[test]
fn test_arima_fixed_order() {
    let input = input_for(
        40,
        json!({"p": 1, "d": 1, "q": 0, "auto_select": false, "prediction_days": 3}),
    );
    let output = run(env!("CARGO_BIN_EXE_arima_predictor"), &[input.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let value = document(&output);
    assert_eq!(value["model_info"]["order"], json!([1, 1, 0]));
    assert_eq!(value["model_info"]["auto_selected"], json!(false));
    assert_eq!(value["predictions"].as_array().unwrap().len(), 3);
}

#[test]
fn test_arima_is_deterministic() {
    let input = input_for(45, json!({"prediction_days": 4}));
    let path = input.path().to_str().unwrap();
    let first = run(env!("CARGO_BIN_EXE_arima_predictor"), &[path]);
    let second = run(env!("CARGO_BIN_EXE_arima_predictor"), &[path]);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_below_minimum_observations() {
    let cases = [
        (env!("CARGO_BIN_EXE_arima_predictor"), 29),
        (env!("CARGO_BIN_EXE_garch_predictor"), 99),
        (env!("CARGO_BIN_EXE_lstm_predictor"), 99),
    ];
    for (binary, n) in cases {
        let input = input_for(n, json!({}));
        let output = run(binary, &[input.path().to_str().unwrap()]);
        let value = assert_failure(&output);
        assert_eq!(value["error_kind"], json!("validation"));
    }
}

#[test]
fn test_garch_predictor_success() {
    let input = input_for(160, json!({"prediction_days": 5}));
    let output = run(env!("CARGO_BIN_EXE_garch_predictor"), &[input.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let value = document(&output);
    let predictions = value["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 5);
    for prediction in predictions {
        assert!(prediction["predicted_volatility"].as_f64().unwrap() > 0.0);
        assert!(
            prediction["price_lower_bound"].as_f64().unwrap()
                < prediction["price_upper_bound"].as_f64().unwrap()
        );
    }
    let info = &value["model_info"];
    assert_eq!(info["order"], json!("GARCH(1,1)"));
    assert_eq!(info["distribution"], json!("normal"));
    let long_run = &info["long_run_volatility"];
    assert!(long_run.is_null() || long_run.as_f64().unwrap() > 0.0);
    assert!(value["risk_metrics"]["VaR_95"].is_number());
    assert!(value["volatility_clustering"]["has_clustering"].is_boolean());
}

#[test]
fn test_garch_is_deterministic() {
    let input = input_for(120, json!({"dist": "t"}));
    let path = input.path().to_str().unwrap();
    let first = run(env!("CARGO_BIN_EXE_garch_predictor"), &[path]);
    let second = run(env!("CARGO_BIN_EXE_garch_predictor"), &[path]);
    assert_eq!(first.status.code(), Some(0));
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_lstm_predictor_with_seed() {
    let input = input_for(
        110,
        json!({"lookback": 5, "units": 8, "epochs": 2, "seed": 3, "prediction_days": 4}),
    );
    let path = input.path().to_str().unwrap();
    let first = run(env!("CARGO_BIN_EXE_lstm_predictor"), &[path]);
    assert_eq!(first.status.code(), Some(0));
    let value = document(&first);
    assert_eq!(value["predictions"].as_array().unwrap().len(), 4);
    assert_symmetric(value["predictions"].as_array().unwrap());
    assert_eq!(value["metrics"]["seed"], json!(3));
    assert_eq!(value["metrics"]["model_type"], json!("LSTM"));

    let second = run(env!("CARGO_BIN_EXE_lstm_predictor"), &[path]);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_linear_predictor_staircase() {
    let input = write_input(
        r#"{"prices": [100, 101, 102, 103, 104, 105, 106, 107, 108, 109], "base_date": "2024-01-31"}"#,
    );
    let output = run(env!("CARGO_BIN_EXE_linear_predictor"), &[input.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let value = document(&output);
    assert_eq!(value["metrics"]["trend"], json!(1.0));
    assert_eq!(value["metrics"]["model_type"], json!("SIMPLE_TREND"));
    let predictions = value["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 7);
    assert_eq!(predictions[0]["predicted_price"], json!(110.0));
    assert_eq!(predictions[0]["target_date"], json!("2024-02-01"));
    assert_symmetric(predictions);
}

#[test]
fn test_malformed_json_is_input_failure() {
    let input = write_input("{\"prices\": [1, 2, 3");
    let output = run(env!("CARGO_BIN_EXE_linear_predictor"), &[input.path().to_str().unwrap()]);
    let value = assert_failure(&output);
    assert_eq!(value["error_kind"], json!("input"));
}

#[test]
fn test_missing_base_date_is_input_failure() {
    let input = write_input(r#"{"prices": [1, 2, 3]}"#);
    let output = run(env!("CARGO_BIN_EXE_arima_predictor"), &[input.path().to_str().unwrap()]);
    assert_failure(&output);
}

#[test]
fn test_byte_order_mark_is_tolerated() {
    let input = write_input("\u{feff}{\"prices\": [10, 11, 12], \"base_date\": \"2024-01-01\"}");
    let output = run(env!("CARGO_BIN_EXE_linear_predictor"), &[input.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_missing_arguments_are_usage_failures() {
    let value = assert_failure(&run(env!("CARGO_BIN_EXE_garch_predictor"), &[]));
    assert_eq!(value["error_kind"], json!("usage"));
}

#[test]
fn test_missing_input_file_is_io_failure() {
    let value = assert_failure(&run(
        env!("CARGO_BIN_EXE_linear_predictor"),
        &["/nonexistent/input.json"],
    ));
    assert_eq!(value["error_kind"], json!("io"));
}

#[test]
fn test_run_model_relays_predictor_document() {
    let input = input_for(40, json!({"prediction_days": 2}));
    let path = input.path().to_str().unwrap();
    let output = run(env!("CARGO_BIN_EXE_run_model"), &["simple", path]);
    assert_eq!(output.status.code(), Some(0));

    let relayed = document(&output);
    let direct = document(&run(env!("CARGO_BIN_EXE_linear_predictor"), &[path]));
    assert_eq!(relayed, direct);
}

#[test]
fn test_run_model_mirrors_failures() {
    let input = input_for(20, json!({}));
    let output = run(
        env!("CARGO_BIN_EXE_run_model"),
        &["arima", input.path().to_str().unwrap(), "--timeout-secs", "60"],
    );
    let value = assert_failure(&output);
    assert_eq!(value["error_kind"], json!("validation"));
}

#[test]
fn test_run_model_rejects_unknown_model() {
    let input = input_for(40, json!({}));
    let output = run(
        env!("CARGO_BIN_EXE_run_model"),
        &["prophet", input.path().to_str().unwrap()],
    );
    let value = assert_failure(&output);
    assert_eq!(value["error_kind"], json!("usage"));
}
