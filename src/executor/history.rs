use crate::error::IntelError;
use crate::models::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

/// Fixed-capacity FIFO; pushing past capacity drops the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(128)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub samples: usize,
    pub average_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub success_rate: f64,
}

impl MetricsSummary {
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let total: u64 = samples.iter().map(|s| s.duration_ms).sum();
        let successes = samples.iter().filter(|s| s.success).count();

        Self {
            samples: samples.len(),
            average_duration_ms: total as f64 / samples.len() as f64,
            min_duration_ms: samples.iter().map(|s| s.duration_ms).min().unwrap_or(0),
            max_duration_ms: samples.iter().map(|s| s.duration_ms).max().unwrap_or(0),
            success_rate: successes as f64 / samples.len() as f64,
        }
    }
}

/// Bounded execution history: recent results overall and per unit, plus metric samples.
#[derive(Debug)]
pub struct ExecutionHistory {
    recent: BoundedBuffer<ExecutionResult>,
    per_unit: HashMap<String, BoundedBuffer<ExecutionResult>>,
    metrics: HashMap<String, BoundedBuffer<MetricSample>>,
    per_unit_limit: usize,
    metrics_window: usize,
}

impl ExecutionHistory {
    pub fn new(history_limit: usize, per_unit_limit: usize, metrics_window: usize) -> Self {
        Self {
            recent: BoundedBuffer::new(history_limit),
            per_unit: HashMap::new(),
            metrics: HashMap::new(),
            per_unit_limit,
            metrics_window,
        }
    }

    pub fn record(&mut self, result: &ExecutionResult) {
        let unit_id = result.unit_id().to_string();
        let (window, per_unit_limit) = (self.metrics_window, self.per_unit_limit);

        self.metrics
            .entry(unit_id.clone())
            .or_insert_with(|| BoundedBuffer::new(window))
            .push(MetricSample {
                timestamp: result.metrics.end_time,
                duration_ms: result.metrics.duration_ms,
                success: result.success,
                memory_bytes: result.metrics.memory_used_bytes,
            });

        self.per_unit
            .entry(unit_id)
            .or_insert_with(|| BoundedBuffer::new(per_unit_limit))
            .push(result.clone());

        self.recent.push(result.clone());
    }

    /// Most recent first.
    pub fn recent(&self) -> Vec<ExecutionResult> {
        self.recent.iter().rev().cloned().collect()
    }

    pub fn for_unit(&self, unit_id: &str) -> Vec<ExecutionResult> {
        self.per_unit
            .get(unit_id)
            .map(|buffer| buffer.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn samples(&self, unit_id: &str) -> Vec<MetricSample> {
        self.metrics
            .get(unit_id)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Returns how many recent results were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.recent.len();
        self.recent.clear();
        self.per_unit.clear();
        self.metrics.clear();
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = IntelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(IntelError::Config(format!("unsupported export format '{}'", s))),
        }
    }
}

/// Flat export row for one retained execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub script_id: String,
    pub success: bool,
    pub duration: u64,
    pub timestamp: DateTime<Utc>,
    pub quality_score: f64,
    pub target_url: String,
    pub error: Option<String>,
}

impl From<&ExecutionResult> for ExportRecord {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            script_id: result.unit_id().to_string(),
            success: result.success,
            duration: result.metrics.duration_ms,
            timestamp: result.metrics.start_time,
            quality_score: result.metadata.quality_score,
            target_url: result.metadata.target_url.clone(),
            error: result.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

pub const CSV_HEADER: &str = "unitId,success,duration,timestamp,qualityScore,targetUrl,error";

pub fn export_records(records: &[ExportRecord], format: ExportFormat) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(records),
        ExportFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for record in records {
                let row = [
                    csv_field(&record.script_id),
                    record.success.to_string(),
                    record.duration.to_string(),
                    record.timestamp.to_rfc3339(),
                    format!("{:.1}", record.quality_score),
                    csv_field(&record.target_url),
                    csv_field(record.error.as_deref().unwrap_or("")),
                ];
                out.push_str(&row.join(","));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Quotes fields containing separators, quotes or newlines; embedded quotes are doubled.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
