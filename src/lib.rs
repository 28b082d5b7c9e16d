pub mod cli;
pub mod error;
pub mod events;
pub mod executor;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod triage;
pub mod units;

pub use error::IntelError;

// Re-export commonly used types
pub use models::{
    AnalysisUnit, CategorizedResult, ErrorKind, ExecutionFailure, ExecutionInput, ExecutionResult,
    IntelligenceData, Priority, ScanResult, UnitDescriptor,
};

pub use executor::{EngineConfig, ExecutionEngine, ExecutionOptions, SandboxPolicy};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, PipelineResult};
pub use registry::UnitRegistry;
pub use triage::Categorizer;

pub use cli::CliHandler;
