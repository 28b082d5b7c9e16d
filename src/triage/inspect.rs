use crate::models::{CategorizedResult, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const SAME_DOMAIN_CONFIDENCE: f64 = 0.8;
pub const SHARED_TECHNOLOGY_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Text,
    Number,
    List,
    Object,
}

impl DetailKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(_) => DetailKind::Number,
            Value::Array(_) => DetailKind::List,
            Value::Object(_) => DetailKind::Object,
            Value::String(_) | Value::Bool(_) | Value::Null => DetailKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEntry {
    pub key: String,
    pub kind: DetailKind,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultAction {
    Export,
    Enhance,
    Correlate,
    Validate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub id: String,
    pub unit_id: String,
    pub category: String,
    pub subcategory: String,
    pub priority: Priority,
    pub confidence: f64,
    pub item_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionMetrics {
    pub execution_time_ms: u64,
    pub data_quality: f64,
    pub confidence_percent: f64,
    pub source_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub kind: String,
    pub from: String,
    pub to: String,
    /// Shared value that produced the link (domain or technology name).
    pub via: String,
    pub confidence: f64,
}

/// Display-agnostic expansion of one categorized result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub overview: Overview,
    pub details: Vec<DetailEntry>,
    pub metrics: InspectionMetrics,
    pub actions: Vec<ResultAction>,
    pub correlations: Vec<Correlation>,
}

pub fn available_actions(result: &CategorizedResult) -> Vec<ResultAction> {
    let mut actions = vec![ResultAction::Export];
    if result.item_count > 0 {
        match result.category.as_str() {
            "contacts" => actions.push(ResultAction::Enhance),
            "technology" => actions.push(ResultAction::Correlate),
            "infrastructure" => actions.push(ResultAction::Validate),
            _ => {}
        }
    }
    actions
}

/// Top-level fields of the intelligence payload, each tagged with its value type.
pub fn detail_entries(result: &CategorizedResult) -> Vec<DetailEntry> {
    let Some(ref data) = result.data else {
        return Vec::new();
    };

    match serde_json::to_value(data) {
        Ok(Value::Object(fields)) => fields
            .into_iter()
            .map(|(key, value)| DetailEntry {
                key,
                kind: DetailKind::of(&value),
                value,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Text of an item: the string itself, or its `value`/`name` field.
fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(fields) => fields
            .get("value")
            .or_else(|| fields.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn emails(result: &CategorizedResult) -> Vec<(String, String)> {
    let Some(ref data) = result.data else {
        return Vec::new();
    };
    data.items
        .iter()
        .filter_map(item_text)
        .filter_map(|text| {
            let (_, domain) = text.rsplit_once('@')?;
            let domain = domain.trim().to_lowercase();
            (!domain.is_empty()).then(|| (text.to_lowercase(), domain))
        })
        .collect()
}

fn technologies(result: &CategorizedResult) -> BTreeSet<String> {
    result
        .data
        .iter()
        .flat_map(|data| data.items.iter())
        .filter_map(item_text)
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Same-domain contacts (within `result` and against peers) and shared technologies against peers.
pub fn correlate_with(result: &CategorizedResult, peers: &[CategorizedResult]) -> Vec<Correlation> {
    let mut correlations = Vec::new();

    match result.category.as_str() {
        "contacts" => {
            let own = emails(result);
            for (i, (email, domain)) in own.iter().enumerate() {
                for (other, other_domain) in own.iter().skip(i + 1) {
                    if domain == other_domain && email != other {
                        correlations.push(Correlation {
                            kind: "same-domain".to_string(),
                            from: email.clone(),
                            to: other.clone(),
                            via: domain.clone(),
                            confidence: SAME_DOMAIN_CONFIDENCE,
                        });
                    }
                }
            }

            for peer in peers.iter().filter(|p| p.id != result.id && p.category == "contacts") {
                for (email, domain) in &own {
                    for (other, other_domain) in emails(peer) {
                        if *domain == other_domain && *email != other {
                            correlations.push(Correlation {
                                kind: "same-domain".to_string(),
                                from: email.clone(),
                                to: other,
                                via: domain.clone(),
                                confidence: SAME_DOMAIN_CONFIDENCE,
                            });
                        }
                    }
                }
            }
        }
        "technology" => {
            let own = technologies(result);
            for peer in peers.iter().filter(|p| p.id != result.id && p.category == "technology") {
                for name in own.intersection(&technologies(peer)) {
                    correlations.push(Correlation {
                        kind: "shared-technology".to_string(),
                        from: result.id.clone(),
                        to: peer.id.clone(),
                        via: name.clone(),
                        confidence: SHARED_TECHNOLOGY_CONFIDENCE,
                    });
                }
            }
        }
        _ => {}
    }

    correlations
}

pub fn inspect_with(result: &CategorizedResult, peers: &[CategorizedResult]) -> Inspection {
    Inspection {
        overview: Overview {
            id: result.id.clone(),
            unit_id: result.unit_id.clone(),
            category: result.category.clone(),
            subcategory: result.subcategory.clone(),
            priority: result.priority,
            confidence: result.confidence,
            item_count: result.item_count,
            timestamp: result.timestamp,
        },
        details: detail_entries(result),
        metrics: InspectionMetrics {
            execution_time_ms: result.metadata.execution_time_ms,
            data_quality: result.metadata.data_quality,
            confidence_percent: (result.confidence * 100.0).round(),
            source_count: result.metadata.sources.len(),
        },
        actions: available_actions(result),
        correlations: correlate_with(result, peers),
    }
}
