use crate::error::{IntelError, Result};
use crate::events::ObserverList;
use crate::executor::ExecutionEvent;
use crate::models::{AnalysisUnit, UnitDescriptor};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStats {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub last_executed: Option<DateTime<Utc>>,
}

impl UnitStats {
    fn record(&mut self, success: bool, duration_ms: u64) {
        self.executions += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        let n = self.executions as f64;
        self.success_rate = self.successes as f64 / n;
        self.average_duration_ms += (duration_ms as f64 - self.average_duration_ms) / n;
        self.last_executed = Some(Utc::now());
    }
}

struct CatalogEntry {
    descriptor: Arc<UnitDescriptor>,
    unit: Arc<dyn AnalysisUnit>,
    stats: UnitStats,
    active: usize,
}

/// Handle returned when an execution is admitted against a registered unit.
#[derive(Clone)]
pub struct UnitHandle {
    pub descriptor: Arc<UnitDescriptor>,
    pub unit: Arc<dyn AnalysisUnit>,
}

/// In-memory catalog of analysis units and their running statistics.
pub struct UnitRegistry {
    entries: RwLock<BTreeMap<String, CatalogEntry>>,
    events: Arc<ObserverList<ExecutionEvent>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            events: Arc::new(ObserverList::new()),
        }
    }

    pub fn events(&self) -> &Arc<ObserverList<ExecutionEvent>> {
        &self.events
    }

    pub fn register(&self, descriptor: UnitDescriptor, unit: Arc<dyn AnalysisUnit>) -> Result<()> {
        descriptor.check().map_err(IntelError::Initialization)?;

        let id = descriptor.id.clone();
        {
            let mut entries = self.entries.write();
            if let Some(existing) = entries.get(&id) {
                if existing.active > 0 {
                    return Err(IntelError::ActiveExecutions {
                        id,
                        active: existing.active,
                    });
                }
                debug!(unit_id = %id, "replacing registered analysis unit");
            }

            entries.insert(
                id.clone(),
                CatalogEntry {
                    descriptor: Arc::new(descriptor.clone()),
                    unit,
                    stats: UnitStats::default(),
                    active: 0,
                },
            );
        }

        info!(unit_id = %id, version = %descriptor.version, "analysis unit registered");
        self.events.emit(&ExecutionEvent::UnitRegistered {
            unit_id: id,
            version: descriptor.version,
        });
        Ok(())
    }

    /// Refuses (returns `false`) while the unit has in-flight executions.
    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.get(id) {
            Some(entry) if entry.active > 0 => {
                warn!(unit_id = %id, active = entry.active, "refusing to unregister busy unit");
                false
            }
            Some(_) => {
                entries.remove(id);
                info!(unit_id = %id, "analysis unit unregistered");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<UnitDescriptor> {
        self.entries
            .read()
            .get(id)
            .map(|entry| entry.descriptor.as_ref().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn list_all(&self) -> Vec<UnitDescriptor> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.descriptor.as_ref().clone())
            .collect()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<UnitDescriptor> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.descriptor.category.eq_ignore_ascii_case(category))
            .map(|entry| entry.descriptor.as_ref().clone())
            .collect()
    }

    pub fn search(&self, text: &str) -> Vec<UnitDescriptor> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.descriptor.matches_text(text))
            .map(|entry| entry.descriptor.as_ref().clone())
            .collect()
    }

    pub fn default_units(&self) -> Vec<UnitDescriptor> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.descriptor.enabled_by_default)
            .map(|entry| entry.descriptor.as_ref().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self, id: &str) -> Option<UnitStats> {
        self.entries.read().get(id).map(|entry| entry.stats.clone())
    }

    pub fn active_executions(&self, id: &str) -> usize {
        self.entries.read().get(id).map(|entry| entry.active).unwrap_or(0)
    }

    /// Updates running aggregates once per completed execution.
    pub fn record_outcome(&self, id: &str, success: bool, duration_ms: u64) -> bool {
        match self.entries.write().get_mut(id) {
            Some(entry) => {
                entry.stats.record(success, duration_ms);
                true
            }
            None => false,
        }
    }

    /// Marks an execution as in flight and hands out the unit to run.
    pub(crate) fn begin_execution(&self, id: &str) -> Option<UnitHandle> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id)?;
        entry.active += 1;
        Some(UnitHandle {
            descriptor: entry.descriptor.clone(),
            unit: entry.unit.clone(),
        })
    }

    pub(crate) fn end_execution(&self, id: &str) {
        if let Some(entry) = self.entries.write().get_mut(id) {
            entry.active = entry.active.saturating_sub(1);
        }
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
