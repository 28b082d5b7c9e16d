// Pipeline module - end-to-end run for one scanned target

pub mod orchestrator;
pub mod status;

pub use orchestrator::{
    flatten_intelligence, ExecutionMode, IntelligenceItem, IntelligenceSink, PipelineConfig,
    PipelineOrchestrator, PipelineResult,
};
pub use status::{HealthCheck, HealthReport, HealthStatus, PipelineStage, PipelineStatus};
