use crate::error::Result;
use crate::events::SubscriptionId;
use crate::executor::config::{EngineConfig, ExecutionOptions, SandboxPolicy};
use crate::executor::context::ExecutionContext;
use crate::executor::events::ExecutionEvent;
use crate::executor::history::{
    export_records, ExecutionHistory, ExportFormat, ExportRecord, MetricSample, MetricsSummary,
};
use crate::models::result::clamp_unit;
use crate::models::{
    ErrorKind, ExecutionFailure, ExecutionInput, ExecutionMetrics, ExecutionResult,
    IntelligenceData, ProcessingStep, ResultMetadata, UnitFailure,
};
use crate::registry::{UnitHandle, UnitRegistry};
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{timeout, timeout_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const FLAG_ADMISSION_REJECTED: &str = "admission-rejected";
pub const FLAG_TIMED_OUT: &str = "timed-out";
pub const FLAG_CLEANUP_FAILED: &str = "cleanup-failed";
pub const FLAG_MEMORY_EXCEEDED: &str = "memory-ceiling-exceeded";

/// One entry of an `execute_batch` call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub unit_id: String,
    pub input: ExecutionInput,
    pub options: ExecutionOptions,
}

impl BatchRequest {
    pub fn new(unit_id: impl Into<String>, input: ExecutionInput) -> Self {
        Self {
            unit_id: unit_id.into(),
            input,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Runs analysis units under admission control, timeouts and the sandbox policy.
pub struct ExecutionEngine {
    registry: Arc<UnitRegistry>,
    config: EngineConfig,
    sandbox: Arc<SandboxPolicy>,
    in_flight: Mutex<HashMap<String, String>>,
    history: Mutex<ExecutionHistory>,
}

/// Reserved admission slot; releases the slot (and the unit's active mark) on drop.
struct AdmissionSlot<'a> {
    engine: &'a ExecutionEngine,
    execution_id: String,
    unit_id: Option<String>,
}

impl AdmissionSlot<'_> {
    fn attach(&mut self, unit_id: &str) {
        self.unit_id = Some(unit_id.to_string());
    }
}

impl Drop for AdmissionSlot<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.lock().remove(&self.execution_id);
        if let Some(ref unit_id) = self.unit_id {
            self.engine.registry.end_execution(unit_id);
        }
    }
}

/// Mutable record of one attempt, turned into an `ExecutionResult` at the end.
struct Attempt {
    steps: Vec<ProcessingStep>,
    flags: Vec<String>,
    outcome: Option<std::result::Result<IntelligenceData, ExecutionFailure>>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            flags: Vec::new(),
            outcome: None,
        }
    }

    fn fail(&mut self, failure: ExecutionFailure) {
        self.outcome = Some(Err(failure));
    }

    fn is_failed(&self) -> bool {
        matches!(self.outcome, Some(Err(_)))
    }
}

impl ExecutionEngine {
    pub fn new(registry: Arc<UnitRegistry>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let history = ExecutionHistory::new(
            config.history_limit,
            config.per_unit_history_limit,
            config.metrics_window,
        );

        Ok(Self {
            registry,
            sandbox: Arc::new(config.sandbox.clone()),
            config,
            in_flight: Mutex::new(HashMap::new()),
            history: Mutex::new(history),
        })
    }

    pub fn with_defaults(registry: Arc<UnitRegistry>) -> Self {
        let config = EngineConfig::default();
        Self {
            registry,
            sandbox: Arc::new(config.sandbox.clone()),
            history: Mutex::new(ExecutionHistory::new(
                config.history_limit,
                config.per_unit_history_limit,
                config.metrics_window,
            )),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn has_capacity(&self) -> bool {
        self.active_count() < self.config.max_concurrent_executions
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.registry.events().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.events().unsubscribe(id)
    }

    /// Checks and reserves a slot under one lock so two callers cannot both take the last one.
    fn try_admit(&self, execution_id: &str, unit_id: &str) -> Option<AdmissionSlot<'_>> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.len() >= self.config.max_concurrent_executions {
            return None;
        }
        in_flight.insert(execution_id.to_string(), unit_id.to_string());
        Some(AdmissionSlot {
            engine: self,
            execution_id: execution_id.to_string(),
            unit_id: None,
        })
    }

    pub async fn execute(
        &self,
        unit_id: &str,
        input: &ExecutionInput,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut slot = match self.try_admit(&execution_id, unit_id) {
            Some(slot) => slot,
            None => {
                warn!(
                    unit_id,
                    max = self.config.max_concurrent_executions,
                    "execution rejected: concurrency limit reached"
                );
                let failure = ExecutionFailure::new(
                    ErrorKind::Resource,
                    format!(
                        "maximum concurrent executions ({}) reached",
                        self.config.max_concurrent_executions
                    ),
                )
                .with_context("maxConcurrentExecutions", self.config.max_concurrent_executions);
                return self.unadmitted_result(
                    unit_id,
                    &execution_id,
                    input,
                    failure,
                    started_at,
                    clock.elapsed(),
                    Some(FLAG_ADMISSION_REJECTED),
                );
            }
        };

        let handle = match self.registry.begin_execution(unit_id) {
            Some(handle) => handle,
            None => {
                let failure = ExecutionFailure::new(
                    ErrorKind::Initialization,
                    format!("analysis unit '{}' is not registered", unit_id),
                )
                .with_context("unitId", unit_id);
                drop(slot);
                return self.unadmitted_result(
                    unit_id,
                    &execution_id,
                    input,
                    failure,
                    started_at,
                    clock.elapsed(),
                    None,
                );
            }
        };
        slot.attach(unit_id);

        debug!(unit_id, execution_id = %execution_id, "execution started");
        self.registry.events().emit(&ExecutionEvent::ExecutionStarted {
            execution_id: execution_id.clone(),
            unit_id: unit_id.to_string(),
        });

        let (attempt, ctx) = self.run_attempt(&handle, &execution_id, input, options).await;
        let result = self.finish(&handle, &execution_id, input, attempt, &ctx, started_at, clock.elapsed());

        // Release the slot before bookkeeping so callers observe a free slot
        // and an unregistrable unit as soon as the result is visible.
        drop(slot);
        self.record(&result);
        result
    }

    async fn run_attempt(
        &self,
        handle: &UnitHandle,
        execution_id: &str,
        input: &ExecutionInput,
        options: &ExecutionOptions,
    ) -> (Attempt, ExecutionContext) {
        let descriptor = &handle.descriptor;
        let mut attempt = Attempt::new();

        let timeout_ms = options
            .timeout_ms
            .or(descriptor.timeout_ms)
            .unwrap_or(self.config.default_timeout_ms);
        let time_limit = Duration::from_millis(timeout_ms);
        let memory_limit = options
            .memory_limit_bytes
            .unwrap_or(self.config.memory_limit_bytes);

        let parameters = match descriptor.resolve_parameters(&options.parameters) {
            Ok(parameters) => parameters,
            Err(failure) => {
                attempt.steps.push(
                    ProcessingStep::new("configure", Duration::ZERO, false).with_note(failure.message.clone()),
                );
                attempt.fail(failure);
                let ctx = ExecutionContext::new(
                    execution_id,
                    &descriptor.id,
                    &input.metadata.target,
                    time_limit,
                    memory_limit,
                    self.sandbox.clone(),
                    Default::default(),
                );
                return (attempt, ctx);
            }
        };

        let ctx = ExecutionContext::new(
            execution_id,
            &descriptor.id,
            &input.metadata.target,
            time_limit,
            memory_limit,
            self.sandbox.clone(),
            parameters,
        );

        // Validation and execution share one deadline.
        let deadline = tokio::time::Instant::now() + time_limit;

        // Hook futures are built inside the guard so a unit that panics while constructing one is caught too.
        let step_clock = Instant::now();
        let validation = async {
            match handle.unit.validate(input, &ctx) {
                Some(validation) => Some(validation.await),
                None => None,
            }
        };
        match timeout_at(deadline, AssertUnwindSafe(validation).catch_unwind()).await {
            Ok(Ok(None)) => {}
            Ok(Ok(Some(outcome))) if outcome.valid => {
                attempt
                    .steps
                    .push(ProcessingStep::new("validate", step_clock.elapsed(), true));
            }
            Ok(Ok(Some(outcome))) => {
                attempt.steps.push(
                    ProcessingStep::new("validate", step_clock.elapsed(), false)
                        .with_note(outcome.failed_checks.join(", ")),
                );
                attempt.fail(
                    ExecutionFailure::new(
                        ErrorKind::Validation,
                        format!("input validation failed for '{}'", descriptor.id),
                    )
                    .with_details(outcome.failed_checks.join(", "))
                    .with_context("failedChecks", outcome.failed_checks),
                );
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic);
                attempt.steps.push(
                    ProcessingStep::new("validate", step_clock.elapsed(), false).with_note(message.clone()),
                );
                attempt.fail(
                    ExecutionFailure::new(ErrorKind::Runtime, "validation raised an unexpected error")
                        .with_details(message),
                );
            }
            Err(_) => {
                attempt
                    .steps
                    .push(ProcessingStep::new("validate", step_clock.elapsed(), false));
                attempt.flags.push(FLAG_TIMED_OUT.to_string());
                attempt.fail(timeout_failure(&descriptor.id, timeout_ms, "validate"));
                ctx.cancel();
            }
        }

        if !attempt.is_failed() {
            let step_clock = Instant::now();
            let execution = async { handle.unit.execute(input, &ctx).await };
            match timeout_at(deadline, AssertUnwindSafe(execution).catch_unwind()).await {
                Ok(Ok(Ok(data))) => {
                    attempt
                        .steps
                        .push(ProcessingStep::new("execute", step_clock.elapsed(), true));
                    attempt.outcome = Some(Ok(data));
                }
                Ok(Ok(Err(failure))) => {
                    let failure = normalize_failure(failure);
                    attempt.steps.push(
                        ProcessingStep::new("execute", step_clock.elapsed(), false)
                            .with_note(failure.message.clone()),
                    );
                    attempt.fail(failure);
                }
                Ok(Err(panic)) => {
                    let message = panic_message(panic);
                    attempt.steps.push(
                        ProcessingStep::new("execute", step_clock.elapsed(), false).with_note(message.clone()),
                    );
                    attempt.fail(
                        ExecutionFailure::new(ErrorKind::Runtime, "analysis unit raised an unexpected error")
                            .with_details(message),
                    );
                }
                Err(_) => {
                    // The unit future is dropped here; it stops at its next suspension point.
                    warn!(unit_id = %descriptor.id, timeout_ms, "analysis unit timed out");
                    attempt
                        .steps
                        .push(ProcessingStep::new("execute", step_clock.elapsed(), false));
                    attempt.flags.push(FLAG_TIMED_OUT.to_string());
                    attempt.fail(timeout_failure(&descriptor.id, timeout_ms, "execute"));
                    ctx.cancel();
                }
            }
        }

        let step_clock = Instant::now();
        let cleanup = async {
            match handle.unit.cleanup(&ctx) {
                Some(cleanup) => Some(cleanup.await),
                None => None,
            }
        };
        let outcome = timeout(self.config.cleanup_timeout(), AssertUnwindSafe(cleanup).catch_unwind()).await;
        let error = match outcome {
            Ok(Ok(None)) => None,
            Ok(Ok(Some(Ok(())))) => {
                attempt
                    .steps
                    .push(ProcessingStep::new("cleanup", step_clock.elapsed(), true));
                None
            }
            Ok(Ok(Some(Err(message)))) => Some(message),
            Ok(Err(panic)) => Some(panic_message(panic)),
            Err(_) => Some(format!(
                "cleanup exceeded {}ms",
                self.config.cleanup_timeout_ms
            )),
        };

        if let Some(message) = error {
            warn!(unit_id = %descriptor.id, error = %message, "analysis unit cleanup failed");
            attempt.steps.push(
                ProcessingStep::new("cleanup", step_clock.elapsed(), false).with_note(message),
            );
            attempt.flags.push(FLAG_CLEANUP_FAILED.to_string());
        }

        let usage = ctx.usage();
        if usage.peak_memory_bytes > memory_limit {
            warn!(
                unit_id = %descriptor.id,
                peak = usage.peak_memory_bytes,
                limit = memory_limit,
                "analysis unit exceeded its memory ceiling"
            );
            attempt.flags.push(FLAG_MEMORY_EXCEEDED.to_string());
            if self.sandbox.enforce_memory_limit && !attempt.is_failed() {
                attempt.fail(
                    ExecutionFailure::new(
                        ErrorKind::Memory,
                        format!("memory use {} exceeds ceiling {}", usage.peak_memory_bytes, memory_limit),
                    )
                    .with_context("peakMemoryBytes", usage.peak_memory_bytes)
                    .with_context("memoryLimitBytes", memory_limit),
                );
            }
        }

        (attempt, ctx)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        handle: &UnitHandle,
        execution_id: &str,
        input: &ExecutionInput,
        attempt: Attempt,
        ctx: &ExecutionContext,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
    ) -> ExecutionResult {
        let usage = ctx.usage();
        let mut metrics = ExecutionMetrics::from_span(started_at, elapsed);
        metrics.memory_used_bytes = usage.peak_memory_bytes;
        metrics.cpu_time_ms = metrics.duration_ms;
        metrics.network_requests = usage.network_requests;
        metrics.cache_hits = usage.cache_hits;
        metrics.cache_misses = usage.cache_misses;

        let mut metadata = ResultMetadata {
            unit_id: handle.descriptor.id.clone(),
            unit_version: handle.descriptor.version.clone(),
            execution_id: execution_id.to_string(),
            target_url: input.metadata.target.clone(),
            steps: attempt.steps,
            quality_score: 0.0,
            flags: attempt.flags,
        };

        match attempt.outcome {
            Some(Ok(mut data)) => {
                // Units may set the public confidence fields directly.
                data.confidence = clamp_unit(data.confidence);
                for relationship in &mut data.relationships {
                    relationship.confidence = clamp_unit(relationship.confidence);
                }
                metadata.quality_score = quality_score(&data, &metadata);
                ExecutionResult::succeeded(data, metrics, metadata)
            }
            Some(Err(failure)) => ExecutionResult::failed(failure, metrics, metadata),
            None => ExecutionResult::failed(
                ExecutionFailure::new(ErrorKind::Unknown, "execution produced no outcome"),
                metrics,
                metadata,
            ),
        }
    }

    fn record(&self, result: &ExecutionResult) {
        self.history.lock().record(result);
        self.registry
            .record_outcome(result.unit_id(), result.success, result.metrics.duration_ms);

        let event = match result.error {
            None => {
                info!(
                    unit_id = %result.unit_id(),
                    duration_ms = result.metrics.duration_ms,
                    items = result.item_count(),
                    "execution completed"
                );
                ExecutionEvent::ExecutionCompleted {
                    execution_id: result.execution_id().to_string(),
                    unit_id: result.unit_id().to_string(),
                    duration_ms: result.metrics.duration_ms,
                }
            }
            Some(ref failure) => {
                info!(
                    unit_id = %result.unit_id(),
                    code = %failure.code,
                    recoverable = failure.recoverable,
                    "execution failed"
                );
                ExecutionEvent::ExecutionFailed {
                    execution_id: result.execution_id().to_string(),
                    unit_id: result.unit_id().to_string(),
                    kind: failure.kind,
                    recoverable: failure.recoverable,
                }
            }
        };
        self.registry.events().emit(&event);
    }

    /// Result for attempts that never reached the unit; not counted as completed executions.
    #[allow(clippy::too_many_arguments)]
    fn unadmitted_result(
        &self,
        unit_id: &str,
        execution_id: &str,
        input: &ExecutionInput,
        failure: ExecutionFailure,
        started_at: chrono::DateTime<Utc>,
        elapsed: Duration,
        flag: Option<&str>,
    ) -> ExecutionResult {
        let metadata = ResultMetadata {
            unit_id: unit_id.to_string(),
            unit_version: String::new(),
            execution_id: execution_id.to_string(),
            target_url: input.metadata.target.clone(),
            steps: Vec::new(),
            quality_score: 0.0,
            flags: flag.map(|f| vec![f.to_string()]).unwrap_or_default(),
        };
        ExecutionResult::failed(failure, ExecutionMetrics::from_span(started_at, elapsed), metadata)
    }

    /// Runs every request concurrently; admission control still applies per request.
    pub async fn execute_batch(&self, requests: Vec<BatchRequest>) -> Vec<ExecutionResult> {
        let clock = Instant::now();
        let futures: Vec<_> = requests
            .iter()
            .map(|request| self.execute(&request.unit_id, &request.input, &request.options))
            .collect();
        let results = join_all(futures).await;

        let succeeded = results.iter().filter(|r| r.success).count();
        self.registry
            .events()
            .emit(&ExecutionEvent::BatchExecutionCompleted {
                total: results.len(),
                succeeded,
                failed: results.len() - succeeded,
                duration_ms: clock.elapsed().as_millis() as u64,
            });
        results
    }

    /// Most recent first, bounded by `history_limit`.
    pub fn recent_results(&self) -> Vec<ExecutionResult> {
        self.history.lock().recent()
    }

    pub fn unit_history(&self, unit_id: &str) -> Vec<ExecutionResult> {
        self.history.lock().for_unit(unit_id)
    }

    pub fn metrics_for(&self, unit_id: &str) -> Vec<MetricSample> {
        self.history.lock().samples(unit_id)
    }

    pub fn metrics_summary(&self, unit_id: &str) -> MetricsSummary {
        MetricsSummary::from_samples(&self.metrics_for(unit_id))
    }

    pub fn clear_history(&self) -> usize {
        let removed = self.history.lock().clear();
        info!(removed, "execution history cleared");
        self.registry
            .events()
            .emit(&ExecutionEvent::HistoryCleared { removed });
        removed
    }

    pub fn export_results(&self, format: ExportFormat) -> Result<String> {
        let records: Vec<ExportRecord> = self
            .recent_results()
            .iter()
            .map(ExportRecord::from)
            .collect();
        Ok(export_records(&records, format)?)
    }
}

fn timeout_failure(unit_id: &str, timeout_ms: u64, phase: &str) -> ExecutionFailure {
    ExecutionFailure::new(
        ErrorKind::Timeout,
        format!("analysis unit '{}' exceeded {}ms", unit_id, timeout_ms),
    )
    .with_context("timeoutMs", timeout_ms)
    .with_context("phase", phase)
}

fn normalize_failure(failure: UnitFailure) -> ExecutionFailure {
    match failure {
        UnitFailure::Structured(failure) => failure,
        UnitFailure::Unspecified => ExecutionFailure::new(
            ErrorKind::Runtime,
            "analysis unit reported failure without an error",
        ),
        UnitFailure::Message(message) => {
            ExecutionFailure::new(ErrorKind::Runtime, "analysis unit failed").with_details(message)
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Confidence scaled to 0-100, discounted for failed steps and flagged resource overruns.
fn quality_score(data: &IntelligenceData, metadata: &ResultMetadata) -> f64 {
    let failed_steps = metadata.steps.iter().filter(|s| !s.success).count() as f64;
    let mut score = data.confidence * 100.0 - failed_steps * 10.0;
    if metadata.has_flag(FLAG_MEMORY_EXCEEDED) {
        score -= 20.0;
    }
    if data.items.is_empty() {
        score -= 25.0;
    }
    score.clamp(0.0, 100.0)
}
