use crate::error::IntelError;
use crate::models::result::IntelligenceData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = IntelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(IntelError::Config(format!("unknown priority '{}'", s))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedMetadata {
    pub execution_time_ms: u64,
    pub data_quality: f64,
    pub sources: Vec<String>,
}

/// Read-only triage view derived from one execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedResult {
    pub id: String,
    pub unit_id: String,
    pub category: String,
    pub subcategory: String,
    pub priority: Priority,
    pub confidence: f64,
    pub item_count: usize,
    pub timestamp: DateTime<Utc>,
    pub metadata: CategorizedMetadata,
    pub data: Option<IntelligenceData>,
}

impl CategorizedResult {
    pub fn is_error(&self) -> bool {
        self.category == crate::triage::rules::ERRORS_CATEGORY
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_seconds() as f64 / 3600.0
    }
}
