use crate::models::error_kind::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Typed intelligence produced by a successful unit execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceData {
    pub category: String,
    pub items: Vec<Value>,
    pub confidence: f64,
    pub relationships: Vec<Relationship>,
    pub validation_notes: Vec<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub confidence: f64,
}

impl IntelligenceData {
    pub fn new(category: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            category: category.into(),
            items,
            confidence: 0.0,
            relationships: Vec::new(),
            validation_notes: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.validation_notes.push(note.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl Relationship {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }
}

/// Structured failure attached to an unsuccessful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub context: BTreeMap<String, Value>,
    pub recoverable: bool,
    pub suggestions: Vec<String>,
    pub retry_after_ms: Option<u64>,
}

impl ExecutionFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            details: None,
            context: BTreeMap::new(),
            recoverable: kind.is_recoverable(),
            suggestions: kind.suggestions().into_iter().map(String::from).collect(),
            retry_after_ms: kind.suggested_backoff().map(|d| d.as_millis() as u64),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub memory_used_bytes: u64,
    pub cpu_time_ms: u64,
    pub network_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ExecutionMetrics {
    /// End time is derived from the measured span so `start <= end` always holds.
    pub fn from_span(start_time: DateTime<Utc>, elapsed: Duration) -> Self {
        let span = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            start_time,
            end_time: start_time + span,
            duration_ms: span.num_milliseconds().max(0) as u64,
            memory_used_bytes: 0,
            cpu_time_ms: 0,
            network_requests: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStep {
    pub name: String,
    pub duration_ms: u64,
    pub success: bool,
    pub note: Option<String>,
}

impl ProcessingStep {
    pub fn new(name: impl Into<String>, elapsed: Duration, success: bool) -> Self {
        Self {
            name: name.into(),
            duration_ms: elapsed.as_millis() as u64,
            success,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub unit_id: String,
    pub unit_version: String,
    pub execution_id: String,
    pub target_url: String,
    pub steps: Vec<ProcessingStep>,
    pub quality_score: f64,
    pub flags: Vec<String>,
}

impl ResultMetadata {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Outcome of one execution attempt. Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Option<IntelligenceData>,
    pub error: Option<ExecutionFailure>,
    pub metrics: ExecutionMetrics,
    pub metadata: ResultMetadata,
}

impl ExecutionResult {
    pub fn succeeded(data: IntelligenceData, metrics: ExecutionMetrics, mut metadata: ResultMetadata) -> Self {
        metadata.quality_score = clamp_quality(metadata.quality_score);
        Self {
            success: true,
            data: Some(data),
            error: None,
            metrics,
            metadata,
        }
    }

    pub fn failed(error: ExecutionFailure, metrics: ExecutionMetrics, mut metadata: ResultMetadata) -> Self {
        metadata.quality_score = 0.0;
        Self {
            success: false,
            data: None,
            error: Some(error),
            metrics,
            metadata,
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.metadata.unit_id
    }

    pub fn execution_id(&self) -> &str {
        &self.metadata.execution_id
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn confidence(&self) -> f64 {
        self.data.as_ref().map(|d| d.confidence).unwrap_or(0.0)
    }

    pub fn item_count(&self) -> usize {
        self.data.as_ref().map(|d| d.item_count()).unwrap_or(0)
    }

    pub fn is_recoverable(&self) -> bool {
        self.error.as_ref().map(|e| e.recoverable).unwrap_or(false)
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub fn clamp_quality(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
