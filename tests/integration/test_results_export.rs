use intelflow::executor::history::CSV_HEADER;
use intelflow::executor::{ExecutionEngine, ExecutionOptions, ExportFormat, ExportRecord};
use intelflow::models::{
    ErrorKind, ExecutionFailure, ExecutionInput, IntelligenceData, UnitDescriptor, UnitFailure,
};
use intelflow::registry::UnitRegistry;
use intelflow::units::FnUnit;
use serde_json::json;
use std::sync::Arc;

fn descriptor(id: &str) -> UnitDescriptor {
    UnitDescriptor::new(id, id, "1.0.0")
        .with_category("technology")
        .with_input("osint")
        .with_output("technology")
}

async fn engine_with_history() -> ExecutionEngine {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("stack-detector"),
            FnUnit::new(|_, _| async {
                Ok(IntelligenceData::new("technology", vec![json!({"name": "nginx"})]).with_confidence(0.8))
            })
            .into_shared(),
        )
        .unwrap();
    registry
        .register(
            descriptor("header-audit"),
            FnUnit::new(|_, _| async {
                Err(UnitFailure::Structured(ExecutionFailure::new(
                    ErrorKind::ApiInvalidResponse,
                    "bad \"token\", giving up",
                )))
            })
            .into_shared(),
        )
        .unwrap();

    let engine = ExecutionEngine::with_defaults(registry);
    let input = ExecutionInput::new(json!({}), "test", "https://shop.example.com");
    for unit_id in ["stack-detector", "header-audit", "stack-detector"] {
        engine.execute(unit_id, &input, &ExecutionOptions::default()).await;
    }
    engine
}

#[tokio::test]
async fn json_export_mirrors_recent_results() {
    let engine = engine_with_history().await;
    let recent = engine.recent_results();

    let exported = engine.export_results(ExportFormat::Json).unwrap();
    let records: Vec<ExportRecord> = serde_json::from_str(&exported).unwrap();

    assert_eq!(records.len(), recent.len());
    for (record, result) in records.iter().zip(&recent) {
        assert_eq!(record.script_id, result.unit_id());
        assert_eq!(record.success, result.success);
        assert_eq!(record.duration, result.metrics.duration_ms);
        assert_eq!(record.target_url, "https://shop.example.com");
    }

    let raw: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert!(raw[0].get("scriptId").is_some());
    assert!(raw[0].get("qualityScore").is_some());
}

#[tokio::test]
async fn csv_export_quotes_error_text() {
    let engine = engine_with_history().await;

    let exported = engine.export_results(ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = exported.lines().collect();

    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 4);
    let failed = lines
        .iter()
        .find(|line| line.starts_with("header-audit,"))
        .unwrap();
    assert!(failed.starts_with("header-audit,false,"), "row: {}", failed);
    assert!(failed.ends_with("\"bad \"\"token\"\", giving up\""), "row: {}", failed);
}

#[tokio::test]
async fn clearing_history_empties_exports() {
    let engine = engine_with_history().await;

    assert_eq!(engine.clear_history(), 3);
    assert!(engine.recent_results().is_empty());
    assert!(engine.unit_history("stack-detector").is_empty());
    assert_eq!(engine.metrics_summary("stack-detector").samples, 0);

    let csv = engine.export_results(ExportFormat::Csv).unwrap();
    assert_eq!(csv.trim_end(), CSV_HEADER);
    let json = engine.export_results(ExportFormat::Json).unwrap();
    assert_eq!(json, "[]");
}

#[test]
fn export_format_parses_case_insensitively() {
    assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    assert!("xml".parse::<ExportFormat>().is_err());
}
