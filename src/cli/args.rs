use crate::error::IntelError;
use crate::executor::{EngineConfig, ExecutionOptions};
use crate::pipeline::PipelineConfig;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Triage report sorted by priority
    Text,
    /// Full pipeline result
    Json,
    /// Flat execution export
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "intelflow")]
#[command(about = "Run OSINT analysis units over a scan result and triage the intelligence")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Scan result JSON file; reads stdin when omitted or "-"
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Run units one after another instead of concurrently
    #[arg(short = 's', long)]
    pub sequential: bool,

    /// Comma-separated unit ids; defaults to every unit enabled by default
    #[arg(short = 'u', long, value_delimiter = ',')]
    pub units: Vec<String>,

    /// Per-unit timeout in milliseconds (100-300000)
    #[arg(short = 't', long, env = "INTELFLOW_TIMEOUT_MS", value_parser = validate_timeout)]
    pub timeout_ms: Option<u64>,

    /// Maximum concurrent unit executions (1-64)
    #[arg(short = 'c', long, env = "INTELFLOW_MAX_CONCURRENT", value_parser = validate_concurrency)]
    pub max_concurrent: Option<usize>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Scan type recorded in the unit input metadata
    #[arg(long, default_value = "standard")]
    pub scan_type: String,

    /// Enable verbose logging to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Result<Self, IntelError> {
        let cli = match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
            Err(e) => return Err(IntelError::InvalidArguments(e.to_string())),
        };
        cli.validate()?;
        Ok(cli)
    }

    pub fn validate(&self) -> Result<(), IntelError> {
        if self.units.iter().any(|u| u.trim().is_empty()) {
            return Err(IntelError::InvalidArguments(
                "Unit ids must not be empty".to_string(),
            ));
        }

        if self.scan_type.trim().is_empty() {
            return Err(IntelError::InvalidArguments(
                "Scan type must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// `None` means stdin.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input
            .as_ref()
            .filter(|path| path.as_os_str() != "-")
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent(max);
        }
        config
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_units(self.units.iter().map(|u| u.trim().to_string()))
            .with_scan_type(self.scan_type.trim())
            .with_options(ExecutionOptions::new());
        if self.sequential {
            config = config.sequential();
        }
        config
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

fn validate_timeout(s: &str) -> Result<u64, String> {
    let timeout: u64 = s.parse().map_err(|_| "Timeout must be a number")?;

    if (100..=300_000).contains(&timeout) {
        Ok(timeout)
    } else {
        Err("Timeout must be between 100 and 300000 milliseconds".to_string())
    }
}

fn validate_concurrency(s: &str) -> Result<usize, String> {
    let max: usize = s.parse().map_err(|_| "Concurrency must be a number")?;

    if (1..=64).contains(&max) {
        Ok(max)
    } else {
        Err("Concurrency must be between 1 and 64".to_string())
    }
}
