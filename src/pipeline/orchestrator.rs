use crate::error::{IntelError, Result};
use crate::events::{ObserverList, SubscriptionId};
use crate::executor::{ExecutionEngine, ExecutionOptions};
use crate::models::{CategorizedResult, ExecutionInput, ExecutionResult, Priority, ScanResult};
use crate::pipeline::status::{
    HealthCheck, HealthReport, HealthStatus, PipelineStage, PipelineStatus,
};
use crate::triage::Categorizer;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub mode: ExecutionMode,
    /// Explicit unit selection; empty means the registry's default set.
    pub unit_ids: Vec<String>,
    pub options: ExecutionOptions,
    pub scan_type: String,
    pub deliver: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            unit_ids: Vec::new(),
            options: ExecutionOptions::default(),
            scan_type: "standard".to_string(),
            deliver: false,
        }
    }
}

impl PipelineConfig {
    pub fn sequential(mut self) -> Self {
        self.mode = ExecutionMode::Sequential;
        self
    }

    pub fn with_units<I, S>(mut self, unit_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unit_ids = unit_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_scan_type(mut self, scan_type: impl Into<String>) -> Self {
        self.scan_type = scan_type.into();
        self
    }

    pub fn with_delivery(mut self) -> Self {
        self.deliver = true;
        self
    }
}

/// One intelligence item, flattened out of a categorized result for downstream stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelligenceItem {
    pub id: String,
    pub execution_id: String,
    pub unit_id: String,
    pub category: String,
    pub subcategory: String,
    pub priority: Priority,
    pub confidence: f64,
    pub target_url: String,
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

/// External consumer of a run's intelligence (store, queue, display layer).
pub trait IntelligenceSink: Send + Sync {
    fn deliver<'a>(
        &'a self,
        items: &'a [IntelligenceItem],
        categorized: &'a [CategorizedResult],
    ) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub run_id: String,
    pub target_url: String,
    pub stage: PipelineStage,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ExecutionResult>,
    pub categorized: Vec<CategorizedResult>,
    pub intelligence: Vec<IntelligenceItem>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Completed && self.error.is_none()
    }

    pub fn result_for(&self, unit_id: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.unit_id() == unit_id)
    }
}

/// Tracks one run's stage and emits a status event per transition.
struct RunTracker<'a> {
    observers: &'a ObserverList<PipelineStatus>,
    run_id: String,
    stage: PipelineStage,
    progress: u8,
}

impl<'a> RunTracker<'a> {
    fn new(observers: &'a ObserverList<PipelineStatus>, run_id: String) -> Self {
        let tracker = Self {
            observers,
            run_id,
            stage: PipelineStage::Initializing,
            progress: 0,
        };
        tracker.emit(None, "pipeline run started".to_string());
        tracker
    }

    fn advance(&mut self, stage: PipelineStage, progress: u8, message: impl Into<String>) {
        if !self.stage.can_advance_to(stage) {
            warn!(from = %self.stage, to = %stage, "ignoring backward pipeline transition");
            return;
        }
        self.stage = stage;
        if stage != PipelineStage::Failed {
            self.progress = progress.max(self.progress).min(100);
        }
        self.emit(None, message.into());
    }

    fn fail(&mut self, message: impl Into<String>) {
        let progress = self.progress;
        self.advance(PipelineStage::Failed, progress, message);
    }

    fn emit(&self, current_unit: Option<String>, message: String) {
        emit_status(self.observers, &self.run_id, self.stage, self.progress, current_unit, message);
    }
}

fn emit_status(
    observers: &ObserverList<PipelineStatus>,
    run_id: &str,
    stage: PipelineStage,
    progress: u8,
    current_unit: Option<String>,
    message: String,
) {
    observers.emit(&PipelineStatus {
        run_id: run_id.to_string(),
        stage,
        progress,
        current_unit,
        message,
    });
}

// Progress budget: units take 10..70, the remaining stages split the rest.
const UNITS_START: u8 = 10;
const UNITS_SPAN: usize = 60;

fn unit_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return UNITS_START + UNITS_SPAN as u8;
    }
    UNITS_START + (done * UNITS_SPAN / total) as u8
}

/// Drives scan result → unit executions → categorization → output for one target.
pub struct PipelineOrchestrator {
    engine: Arc<ExecutionEngine>,
    categorizer: Arc<Categorizer>,
    sink: Option<Arc<dyn IntelligenceSink>>,
    observers: ObserverList<PipelineStatus>,
}

impl PipelineOrchestrator {
    pub fn new(engine: Arc<ExecutionEngine>, categorizer: Arc<Categorizer>) -> Self {
        Self {
            engine,
            categorizer,
            sink: None,
            observers: ObserverList::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn IntelligenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    pub fn categorizer(&self) -> &Arc<Categorizer> {
        &self.categorizer
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PipelineStatus) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Checks the minimum input a run needs before any unit executes.
    pub fn validate_scan(scan: &ScanResult) -> Result<()> {
        if scan.url.trim().is_empty() {
            return Err(IntelError::PipelineInput(
                "scan result has no target URL".to_string(),
            ));
        }
        if scan.osint_data.is_none() {
            return Err(IntelError::PipelineInput(format!(
                "scan result for {} carries no OSINT data",
                scan.url
            )));
        }
        Ok(())
    }

    fn select_units(&self, config: &PipelineConfig) -> Vec<String> {
        if !config.unit_ids.is_empty() {
            return config.unit_ids.clone();
        }
        self.engine
            .registry()
            .default_units()
            .into_iter()
            .map(|descriptor| descriptor.id)
            .collect()
    }

    pub async fn run(&self, scan: &ScanResult, config: &PipelineConfig) -> PipelineResult {
        let clock = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let mut result = PipelineResult {
            run_id: run_id.clone(),
            target_url: scan.url.clone(),
            stage: PipelineStage::Initializing,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
            categorized: Vec::new(),
            intelligence: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
            error: None,
        };
        let mut tracker = RunTracker::new(&self.observers, run_id.clone());

        let prepared = Self::validate_scan(scan)
            .and_then(|_| ExecutionInput::from_scan(scan, &config.scan_type).map_err(IntelError::from));
        let input = match prepared {
            Ok(input) => input,
            Err(e) => {
                error!(target_url = %scan.url, error = %e, "pipeline input rejected");
                tracker.fail(e.to_string());
                result.error = Some(e.to_string());
                return finish(result, &tracker, clock);
            }
        };

        let units = self.select_units(config);
        if units.is_empty() {
            let message = "no analysis units selected".to_string();
            error!(target_url = %scan.url, "{}", message);
            tracker.fail(message.clone());
            result.error = Some(message);
            return finish(result, &tracker, clock);
        }

        info!(run_id = %run_id, target_url = %scan.url, units = units.len(), mode = ?config.mode, "pipeline run started");
        tracker.advance(
            PipelineStage::ExecutingUnits,
            UNITS_START,
            format!("executing {} analysis unit(s)", units.len()),
        );

        result.results = match config.mode {
            ExecutionMode::Sequential => self.run_sequential(&run_id, &units, &input, &config.options).await,
            ExecutionMode::Parallel => self.run_parallel(&run_id, &units, &input, &config.options).await,
        };
        result.attempted = result.results.len();
        result.succeeded = result.results.iter().filter(|r| r.success).count();
        result.failed = result.attempted - result.succeeded;

        tracker.advance(
            PipelineStage::Categorizing,
            75,
            format!("categorizing {} successful result(s)", result.succeeded),
        );
        result.categorized = self
            .categorizer
            .categorize_all(result.results.iter().filter(|r| r.success));

        tracker.advance(PipelineStage::PreparingOutput, 90, "preparing intelligence output");
        result.intelligence = flatten_intelligence(&result.categorized, &scan.url);

        if config.deliver {
            match self.sink {
                Some(ref sink) => {
                    tracker.advance(
                        PipelineStage::Delivering,
                        95,
                        format!("delivering {} intelligence item(s)", result.intelligence.len()),
                    );
                    let delivery = sink.deliver(&result.intelligence, &result.categorized).await;
                    if let Err(e) = delivery {
                        error!(run_id = %run_id, error = %e, "intelligence delivery failed");
                        tracker.fail(e.to_string());
                        result.error = Some(e.to_string());
                        return finish(result, &tracker, clock);
                    }
                }
                None => warn!(run_id = %run_id, "delivery requested but no sink is configured"),
            }
        }

        tracker.advance(PipelineStage::Completed, 100, "pipeline run completed");
        info!(
            run_id = %run_id,
            attempted = result.attempted,
            succeeded = result.succeeded,
            failed = result.failed,
            "pipeline run completed"
        );
        finish(result, &tracker, clock)
    }

    async fn run_sequential(
        &self,
        run_id: &str,
        units: &[String],
        input: &ExecutionInput,
        options: &ExecutionOptions,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(units.len());
        for (index, unit_id) in units.iter().enumerate() {
            let result = self.engine.execute(unit_id, input, options).await;
            self.unit_finished(run_id, unit_id, &result, index + 1, units.len());
            results.push(result);
        }
        results
    }

    /// Issues every call at once; the engine's admission control does the throttling.
    async fn run_parallel(
        &self,
        run_id: &str,
        units: &[String],
        input: &ExecutionInput,
        options: &ExecutionOptions,
    ) -> Vec<ExecutionResult> {
        let completed = AtomicUsize::new(0);
        let futures = units.iter().map(|unit_id| {
            let completed = &completed;
            async move {
                let result = self.engine.execute(unit_id, input, options).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.unit_finished(run_id, unit_id, &result, done, units.len());
                result
            }
        });
        join_all(futures).await
    }

    fn unit_finished(&self, run_id: &str, unit_id: &str, result: &ExecutionResult, done: usize, total: usize) {
        let message = match result.error {
            None => format!("{} completed ({}/{})", unit_id, done, total),
            Some(ref failure) => format!("{} failed: {} ({}/{})", unit_id, failure.code, done, total),
        };
        debug!(run_id, unit_id, success = result.success, "unit finished");
        emit_status(
            &self.observers,
            run_id,
            PipelineStage::ExecutingUnits,
            unit_progress(done, total),
            Some(unit_id.to_string()),
            message,
        );
    }

    /// Cheap readiness probe; never panics.
    pub fn health_check(&self) -> HealthReport {
        let registry = self.engine.registry();
        let default_units = registry.default_units().len();
        let active = self.engine.active_count();
        let max = self.engine.config().max_concurrent_executions;

        let checks = vec![
            HealthCheck {
                name: "registry".to_string(),
                healthy: default_units > 0,
                message: format!("{} default unit(s) of {} registered", default_units, registry.len()),
            },
            HealthCheck {
                name: "execution-engine".to_string(),
                healthy: active < max,
                message: format!("{}/{} execution slots in use", active, max),
            },
            HealthCheck {
                name: "categorizer".to_string(),
                healthy: true,
                message: format!("{} categorized result(s) stored", self.categorizer.len()),
            },
        ];

        let status = if default_units == 0 {
            HealthStatus::Unhealthy
        } else if checks.iter().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport { status, checks }
    }
}

fn finish(mut result: PipelineResult, tracker: &RunTracker<'_>, clock: Instant) -> PipelineResult {
    result.stage = tracker.stage;
    result.duration_ms = clock.elapsed().as_millis() as u64;
    result
}

pub fn flatten_intelligence(categorized: &[CategorizedResult], target_url: &str) -> Vec<IntelligenceItem> {
    categorized
        .iter()
        .filter_map(|c| c.data.as_ref().map(|data| (c, data)))
        .flat_map(|(c, data)| {
            data.items.iter().enumerate().map(move |(index, value)| IntelligenceItem {
                id: format!("{}:{}", c.id, index),
                execution_id: c.id.clone(),
                unit_id: c.unit_id.clone(),
                category: c.category.clone(),
                subcategory: c.subcategory.clone(),
                priority: c.priority,
                confidence: c.confidence,
                target_url: target_url.to_string(),
                timestamp: c.timestamp,
                value: value.clone(),
            })
        })
        .collect()
}
