use clap::Parser;
use intelflow::cli::{exit_code_for, Cli, OutputFormat};
use intelflow::pipeline::{PipelineResult, PipelineStage};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn write_scan(name: &str, scan: &serde_json::Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!("intelflow-{}-{}.json", name, std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(scan.to_string().as_bytes()).unwrap();
    path
}

fn run_binary(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_intelflow"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("INTELFLOW_TIMEOUT_MS")
        .env_remove("INTELFLOW_MAX_CONCURRENT")
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn complete_scan() -> serde_json::Value {
    json!({
        "url": "https://example.com",
        "status": "completed",
        "osintData": {
            "emails": ["info@example.com"],
            "technologies": ["WordPress 6.4"],
            "serverInfo": {"server": "Apache/2.4.58"},
            "subdomains": ["blog.example.com"]
        }
    })
}

#[test]
fn test_basic_cli_parsing() {
    let cli = Cli::try_parse_from(vec!["intelflow"]);
    assert!(cli.is_ok());
    let cli = cli.unwrap();

    assert!(cli.input.is_none());
    assert!(cli.units.is_empty());
    assert_eq!(cli.format, OutputFormat::Text);
    assert_eq!(cli.scan_type, "standard");
}

#[test]
fn test_cli_with_all_options() {
    let args = vec![
        "intelflow",
        "--input", "scan.json",
        "--units", "contact-collector,infrastructure-mapper",
        "--timeout-ms", "30000",
        "--max-concurrent", "8",
        "--format", "csv",
        "--scan-type", "deep",
        "--sequential",
        "--verbose",
    ];

    let cli = Cli::try_parse_from(args);
    assert!(cli.is_ok());
    let cli = cli.unwrap();

    assert_eq!(cli.input, Some(PathBuf::from("scan.json")));
    assert_eq!(cli.units, vec!["contact-collector", "infrastructure-mapper"]);
    assert_eq!(cli.timeout_ms, Some(30_000));
    assert_eq!(cli.max_concurrent, Some(8));
    assert_eq!(cli.format, OutputFormat::Csv);
    assert_eq!(cli.scan_type, "deep");
    assert!(cli.sequential);
    assert!(cli.verbose);
}

#[test]
fn test_cli_rejects_out_of_range_values() {
    assert!(Cli::try_parse_from(vec!["intelflow", "-t", "99"]).is_err());
    assert!(Cli::try_parse_from(vec!["intelflow", "-c", "65"]).is_err());
    assert!(Cli::try_parse_from(vec!["intelflow", "-c", "many"]).is_err());
    assert!(Cli::try_parse_from(vec!["intelflow", "--unknown-flag"]).is_err());
}

#[test]
fn test_exit_code_for_pipeline_outcome() {
    let mut result: PipelineResult = serde_json::from_value(json!({
        "runId": "run-7",
        "targetUrl": "https://example.com",
        "stage": "completed",
        "attempted": 0,
        "succeeded": 0,
        "failed": 0,
        "results": [],
        "categorized": [],
        "intelligence": [],
        "startedAt": "2024-05-01T10:00:00Z",
        "durationMs": 3,
        "error": null
    }))
    .unwrap();
    assert_eq!(exit_code_for(&result), 0);

    result.stage = PipelineStage::Failed;
    result.error = Some("delivery refused".to_string());
    assert_eq!(exit_code_for(&result), 1);
}

#[test]
fn test_binary_emits_json_pipeline_result() {
    let path = write_scan("complete", &complete_scan());

    let output = run_binary(&["--input", path.to_str().unwrap(), "--format", "json"]);
    std::fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let result: PipelineResult = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result.stage, PipelineStage::Completed);
    assert_eq!(result.target_url, "https://example.com");
    assert_eq!(result.attempted, 3);
}

#[test]
fn test_binary_text_report() {
    let path = write_scan("report", &complete_scan());

    let output = run_binary(&["-i", path.to_str().unwrap(), "-s"]);
    std::fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("INTELFLOW TRIAGE REPORT"), "stdout: {}", stdout);
    assert!(stdout.contains("3 attempted, 3 succeeded, 0 failed"), "stdout: {}", stdout);
}

#[test]
fn test_binary_csv_export_header() {
    let path = write_scan("csv", &complete_scan());

    let output = run_binary(&["-i", path.to_str().unwrap(), "-f", "csv", "-u", "contact-collector"]);
    std::fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("unitId,success,duration,timestamp,qualityScore,targetUrl,error"));
    assert!(lines.next().unwrap().starts_with("contact-collector,true,"));
}

#[test]
fn test_binary_rejects_scan_without_osint_data() {
    let path = write_scan("no-osint", &json!({"url": "https://example.com", "status": "failed"}));

    let output = run_binary(&["-i", path.to_str().unwrap()]);
    std::fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PIPELINE ERROR"));
}

#[test]
fn test_binary_rejects_empty_stdin() {
    let output = run_binary(&["--input", "-"]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_binary_invalid_arguments_exit_code() {
    let output = run_binary(&["--timeout-ms", "5"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_binary_help_exits_cleanly() {
    let output = run_binary(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--units"));
}
