use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of the scanning collaborator for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub url: String,
    pub status: ScanStatus,
    #[serde(default)]
    pub osint_data: Option<OsintData>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OsintData {
    pub emails: Vec<String>,
    pub social_links: Vec<String>,
    pub technologies: Vec<String>,
    pub server_info: BTreeMap<String, String>,
    pub subdomains: Vec<String>,
}

impl OsintData {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.social_links.is_empty()
            && self.technologies.is_empty()
            && self.server_info.is_empty()
            && self.subdomains.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.emails.len()
            + self.social_links.len()
            + self.technologies.len()
            + self.server_info.len()
            + self.subdomains.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub target: String,
    pub scan_type: String,
    pub confidence: f64,
}

/// Data handed to an analysis unit for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInput {
    pub payload: serde_json::Value,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: ScanMetadata,
}

impl ExecutionInput {
    pub fn new(payload: serde_json::Value, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            payload,
            source: source.into(),
            timestamp: Utc::now(),
            metadata: ScanMetadata {
                target: target.into(),
                scan_type: "standard".to_string(),
                confidence: 0.8,
            },
        }
    }

    pub fn from_scan(scan: &ScanResult, scan_type: &str) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(scan.osint_data.clone().unwrap_or_default())?;
        Ok(Self {
            payload,
            source: "scanner".to_string(),
            timestamp: Utc::now(),
            metadata: ScanMetadata {
                target: scan.url.clone(),
                scan_type: scan_type.to_string(),
                confidence: scan.confidence.unwrap_or(0.8).clamp(0.0, 1.0),
            },
        })
    }

    pub fn with_scan_type(mut self, scan_type: impl Into<String>) -> Self {
        self.metadata.scan_type = scan_type.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Payload decoded as the scanner's OSINT bag.
    pub fn osint(&self) -> Option<OsintData> {
        serde_json::from_value(self.payload.clone()).ok()
    }

    pub fn payload_field(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload.get(name)
    }
}
