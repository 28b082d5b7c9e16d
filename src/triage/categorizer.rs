use crate::error::{IntelError, Result};
use crate::models::{CategorizedMetadata, CategorizedResult, ExecutionResult, Priority};
use crate::triage::inspect::{correlate_with, inspect_with, Correlation, Inspection};
use crate::triage::rules::{
    classify_priority, error_subcategory, resolve_category, resolve_subcategory, ERRORS_CATEGORY,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Conjunctive filter; unset criteria always pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub min_confidence: Option<f64>,
    pub max_age_hours: Option<f64>,
    pub priority: Option<Priority>,
    pub unit_id: Option<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    pub fn with_max_age_hours(mut self, hours: f64) -> Self {
        self.max_age_hours = Some(hours);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.into());
        self
    }

    pub fn matches(&self, result: &CategorizedResult, now: DateTime<Utc>) -> bool {
        if let Some(ref category) = self.category {
            if !result.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(ref subcategory) = self.subcategory {
            if !result.subcategory.eq_ignore_ascii_case(subcategory) {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if result.confidence < min {
                return false;
            }
        }
        if let Some(max_age) = self.max_age_hours {
            if result.age_hours(now) > max_age {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if result.priority != priority {
                return false;
            }
        }
        if let Some(ref unit_id) = self.unit_id {
            if &result.unit_id != unit_id {
                return false;
            }
        }
        true
    }
}

/// Derives the triage view of one execution result without storing it.
pub fn build_categorized(result: &ExecutionResult) -> Result<CategorizedResult> {
    if result.execution_id().is_empty() {
        return Err(IntelError::Categorization(format!(
            "result from '{}' has no execution id",
            result.unit_id()
        )));
    }

    let (category, subcategory) = match (result.success, &result.data, &result.error) {
        (true, Some(data), None) => (
            resolve_category(result.unit_id(), &data.category),
            resolve_subcategory(result.unit_id(), &data.category),
        ),
        (false, None, Some(error)) => (ERRORS_CATEGORY, error_subcategory(Some(error.kind))),
        _ => {
            return Err(IntelError::Categorization(format!(
                "result {} has inconsistent success/data/error fields",
                result.execution_id()
            )))
        }
    };

    let confidence = result.confidence();
    let item_count = result.item_count();
    let sources = match result.data {
        Some(ref data) if !data.sources.is_empty() => data.sources.clone(),
        _ => vec![result.unit_id().to_string()],
    };

    Ok(CategorizedResult {
        id: result.execution_id().to_string(),
        unit_id: result.unit_id().to_string(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        priority: classify_priority(confidence, item_count, category),
        confidence,
        item_count,
        timestamp: result.metrics.end_time,
        metadata: CategorizedMetadata {
            execution_time_ms: result.metrics.duration_ms,
            data_quality: result.metadata.quality_score,
            sources,
        },
        data: result.data.clone(),
    })
}

pub fn filter(results: &[CategorizedResult], criteria: &FilterCriteria) -> Vec<CategorizedResult> {
    filter_at(results, criteria, Utc::now())
}

pub fn filter_at(
    results: &[CategorizedResult],
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<CategorizedResult> {
    results
        .iter()
        .filter(|r| criteria.matches(r, now))
        .cloned()
        .collect()
}

/// Stable: priority, then confidence, then item count, all descending.
pub fn sort(results: &mut [CategorizedResult]) {
    results.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| b.item_count.cmp(&a.item_count))
    });
}

pub const DEFAULT_RESULT_LIMIT: usize = 1000;

/// Categorized results keyed by execution id, oldest evicted first once full.
struct ResultStore {
    entries: HashMap<String, CategorizedResult>,
    order: VecDeque<String>,
    limit: usize,
}

impl ResultStore {
    fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Returns the id of an evicted entry, if any.
    fn upsert(&mut self, result: CategorizedResult) -> Option<String> {
        if let Some(existing) = self.entries.get_mut(&result.id) {
            *existing = result;
            return None;
        }

        let mut evicted = None;
        if self.order.len() == self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.order.push_back(result.id.clone());
        self.entries.insert(result.id.clone(), result);
        evicted
    }

    fn to_vec(&self) -> Vec<CategorizedResult> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    fn clear(&mut self) -> usize {
        let removed = self.order.len();
        self.order.clear();
        self.entries.clear();
        removed
    }
}

/// Accumulated categorized results, bounded by `result_limit`.
pub struct Categorizer {
    store: RwLock<ResultStore>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_RESULT_LIMIT)
    }
}

impl Categorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(result_limit: usize) -> Self {
        Self {
            store: RwLock::new(ResultStore::new(result_limit)),
        }
    }

    pub fn result_limit(&self) -> usize {
        self.store.read().limit
    }

    /// Categorizes and stores; recomputing an execution id replaces the earlier entry.
    pub fn categorize(&self, result: &ExecutionResult) -> Result<CategorizedResult> {
        let categorized = build_categorized(result)?;

        if let Some(evicted) = self.store.write().upsert(categorized.clone()) {
            debug!(execution_id = %evicted, "evicted oldest categorized result");
        }

        debug!(
            execution_id = %categorized.id,
            category = %categorized.category,
            priority = %categorized.priority,
            "result categorized"
        );
        Ok(categorized)
    }

    /// Categorizes a batch; results that cannot be categorized are logged and dropped.
    pub fn categorize_all<'a, I>(&self, results: I) -> Vec<CategorizedResult>
    where
        I: IntoIterator<Item = &'a ExecutionResult>,
    {
        results
            .into_iter()
            .filter_map(|result| match self.categorize(result) {
                Ok(categorized) => Some(categorized),
                Err(e) => {
                    warn!(unit_id = %result.unit_id(), error = %e, "dropping uncategorizable result");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<CategorizedResult> {
        self.store.read().entries.get(id).cloned()
    }

    /// Stored results, oldest first.
    pub fn all(&self) -> Vec<CategorizedResult> {
        self.store.read().to_vec()
    }

    pub fn len(&self) -> usize {
        self.store.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().order.is_empty()
    }

    pub fn clear(&self) -> usize {
        self.store.write().clear()
    }

    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<CategorizedResult> {
        filter(&self.all(), criteria)
    }

    /// Stored results in triage order.
    pub fn sorted(&self) -> Vec<CategorizedResult> {
        let mut results = self.all();
        sort(&mut results);
        results
    }

    /// Links between `result` and itself or other stored results.
    pub fn correlate(&self, result: &CategorizedResult) -> Vec<Correlation> {
        correlate_with(result, &self.all())
    }

    pub fn inspect(&self, result: &CategorizedResult) -> Inspection {
        inspect_with(result, &self.all())
    }
}
