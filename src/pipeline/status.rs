use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Initializing,
    ExecutingUnits,
    Categorizing,
    PreparingOutput,
    Delivering,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Initializing => "initializing",
            PipelineStage::ExecutingUnits => "executing-units",
            PipelineStage::Categorizing => "categorizing",
            PipelineStage::PreparingOutput => "preparing-output",
            PipelineStage::Delivering => "delivering",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    fn ordinal(&self) -> u8 {
        match self {
            PipelineStage::Initializing => 0,
            PipelineStage::ExecutingUnits => 1,
            PipelineStage::Categorizing => 2,
            PipelineStage::PreparingOutput => 3,
            PipelineStage::Delivering => 4,
            PipelineStage::Completed => 5,
            PipelineStage::Failed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// Forward-only; `Failed` is reachable from any non-terminal stage.
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == PipelineStage::Failed || next.ordinal() > self.ordinal()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status event emitted on every stage transition and per finished unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub run_id: String,
    pub stage: PipelineStage,
    pub progress: u8,
    pub current_unit: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
}
