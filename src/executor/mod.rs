// Executor module - runs analysis units under admission control and timeouts

pub mod config;
pub mod context;
pub mod events;
pub mod history;
pub mod runner;

pub use config::{Capability, EngineConfig, ExecutionOptions, SandboxPolicy};
pub use context::{ExecutionContext, ResourceUsage};
pub use events::ExecutionEvent;
pub use history::{ExportFormat, ExportRecord, MetricSample, MetricsSummary};
pub use runner::{BatchRequest, ExecutionEngine};
