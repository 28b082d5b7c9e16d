pub mod args;
pub mod reporter;

pub use args::{Cli, OutputFormat};
pub use reporter::ReportFormatter;

use crate::error::{IntelError, Result};
use crate::executor::{ExecutionEngine, ExportFormat};
use crate::models::ScanResult;
use crate::pipeline::{PipelineOrchestrator, PipelineResult};
use crate::registry::UnitRegistry;
use crate::triage::Categorizer;
use crate::units::register_builtins;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

pub struct CliHandler {
    cli: Cli,
}

impl CliHandler {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Runs the pipeline once and returns the process exit code.
    pub async fn run(&self) -> Result<i32> {
        let raw = self.read_input()?;
        if raw.trim().is_empty() {
            return Err(IntelError::PipelineInput("no scan result provided".to_string()));
        }

        let scan: ScanResult = serde_json::from_str(&raw)
            .map_err(|e| IntelError::PipelineInput(format!("invalid scan result: {}", e)))?;
        PipelineOrchestrator::validate_scan(&scan)?;
        debug!(target_url = %scan.url, bytes = raw.len(), "scan result loaded");

        let orchestrator = self.build_orchestrator()?;
        let formatter = ReportFormatter::new(&self.cli);
        if self.cli.is_verbose() {
            let progress = ReportFormatter::new(&self.cli);
            orchestrator.subscribe(move |status| eprintln!("{}", progress.format_progress(status)));
        }

        let result = orchestrator.run(&scan, &self.cli.pipeline_config()).await;
        info!(
            run_id = %result.run_id,
            stage = %result.stage,
            duration_ms = result.duration_ms,
            "pipeline finished"
        );

        let rendered = match self.cli.format {
            OutputFormat::Text => formatter.format_pipeline_report(&result),
            OutputFormat::Json => serde_json::to_string_pretty(&result)?,
            OutputFormat::Csv => orchestrator.engine().export_results(ExportFormat::Csv)?,
        };
        println!("{}", rendered);

        Ok(exit_code_for(&result))
    }

    fn build_orchestrator(&self) -> Result<PipelineOrchestrator> {
        let registry = Arc::new(UnitRegistry::new());
        let registered = register_builtins(&registry)?;
        debug!(registered, "built-in units registered");

        let engine = Arc::new(ExecutionEngine::new(registry, self.cli.engine_config())?);
        Ok(PipelineOrchestrator::new(engine, Arc::new(Categorizer::new())))
    }

    fn read_input(&self) -> Result<String> {
        match self.cli.input_path() {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

/// 0 when the run completed, 1 when it ended in the failed stage.
pub fn exit_code_for(result: &PipelineResult) -> i32 {
    if result.is_success() {
        0
    } else {
        1
    }
}
