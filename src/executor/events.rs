use crate::models::ErrorKind;
use serde::{Deserialize, Serialize};

/// Execution lifecycle events published by the registry and engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExecutionEvent {
    UnitRegistered {
        unit_id: String,
        version: String,
    },
    ExecutionStarted {
        execution_id: String,
        unit_id: String,
    },
    ExecutionCompleted {
        execution_id: String,
        unit_id: String,
        duration_ms: u64,
    },
    ExecutionFailed {
        execution_id: String,
        unit_id: String,
        kind: ErrorKind,
        recoverable: bool,
    },
    BatchExecutionCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
    HistoryCleared {
        removed: usize,
    },
}

impl ExecutionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionEvent::UnitRegistered { .. } => "unit-registered",
            ExecutionEvent::ExecutionStarted { .. } => "execution-started",
            ExecutionEvent::ExecutionCompleted { .. } => "execution-completed",
            ExecutionEvent::ExecutionFailed { .. } => "execution-failed",
            ExecutionEvent::BatchExecutionCompleted { .. } => "batch-execution-completed",
            ExecutionEvent::HistoryCleared { .. } => "history-cleared",
        }
    }
}
