use futures::future::BoxFuture;
use futures::FutureExt;
use intelflow::error::{IntelError, Result};
use intelflow::executor::{EngineConfig, ExecutionContext, ExecutionEngine};
use intelflow::models::{
    CategorizedResult, ErrorKind, ExecutionInput, IntelligenceData, Priority, ScanResult,
    UnitDescriptor, UnitFailure, ValidationOutcome,
};
use intelflow::pipeline::{
    HealthStatus, IntelligenceItem, IntelligenceSink, PipelineConfig, PipelineOrchestrator,
    PipelineStage, PipelineStatus,
};
use intelflow::registry::UnitRegistry;
use intelflow::triage::{Categorizer, FilterCriteria};
use intelflow::units::{register_builtins, FnUnit};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn scan() -> ScanResult {
    serde_json::from_value(json!({
        "url": "https://example.com",
        "status": "completed",
        "confidence": 0.9,
        "osintData": {
            "emails": ["security@example.com", "press@example.com", "someone@gmail.com"],
            "socialLinks": ["https://twitter.com/example"],
            "technologies": ["React 18.2", "Cloudflare"],
            "serverInfo": {"server": "nginx/1.25.3", "x-powered-by": "Express"},
            "subdomains": ["api.example.com", "mail.example.com", "cdn.example.com"]
        }
    }))
    .unwrap()
}

fn registry_with_builtins() -> Arc<UnitRegistry> {
    let registry = Arc::new(UnitRegistry::new());
    register_builtins(&registry).unwrap();
    registry
}

fn orchestrator(registry: Arc<UnitRegistry>) -> PipelineOrchestrator {
    let engine = Arc::new(ExecutionEngine::new(registry, EngineConfig::default()).unwrap());
    PipelineOrchestrator::new(engine, Arc::new(Categorizer::new()))
}

fn record_statuses(orchestrator: &PipelineOrchestrator) -> Arc<Mutex<Vec<PipelineStatus>>> {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    orchestrator.subscribe(move |status: &PipelineStatus| sink.lock().push(status.clone()));
    statuses
}

struct RecordingSink {
    delivered: Mutex<Vec<IntelligenceItem>>,
    refuse: bool,
}

impl RecordingSink {
    fn new(refuse: bool) -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            refuse,
        })
    }
}

impl IntelligenceSink for RecordingSink {
    fn deliver<'a>(
        &'a self,
        items: &'a [IntelligenceItem],
        _categorized: &'a [CategorizedResult],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if self.refuse {
                return Err(IntelError::Delivery("intelligence store offline".to_string()));
            }
            self.delivered.lock().extend_from_slice(items);
            Ok(())
        }
        .boxed()
    }
}

#[tokio::test]
async fn parallel_run_completes_with_builtins() {
    let orchestrator = orchestrator(registry_with_builtins());
    let statuses = record_statuses(&orchestrator);

    let result = orchestrator.run(&scan(), &PipelineConfig::default()).await;

    assert!(result.is_success(), "result: {:?}", result.error);
    assert_eq!(result.stage, PipelineStage::Completed);
    assert_eq!(result.attempted, 3);
    assert_eq!(result.succeeded, 3);
    assert_eq!(result.failed, 0);
    assert_eq!(result.categorized.len(), 3);
    assert!(!result.intelligence.is_empty());
    assert!(result
        .intelligence
        .iter()
        .all(|item| item.target_url == "https://example.com"));

    let contacts = result.result_for("contact-collector").unwrap();
    assert_eq!(contacts.item_count(), 4);

    let statuses = statuses.lock();
    assert_eq!(statuses.first().unwrap().stage, PipelineStage::Initializing);
    let last = statuses.last().unwrap();
    assert_eq!(last.stage, PipelineStage::Completed);
    assert_eq!(last.progress, 100);
    assert!(statuses.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert!(statuses.iter().all(|s| s.run_id == result.run_id));

    let stages: Vec<PipelineStage> = statuses.iter().map(|s| s.stage).collect();
    let position = |stage| stages.iter().position(|s| *s == stage).unwrap();
    assert!(position(PipelineStage::ExecutingUnits) < position(PipelineStage::Categorizing));
    assert!(position(PipelineStage::Categorizing) < position(PipelineStage::PreparingOutput));
    assert!(position(PipelineStage::PreparingOutput) < position(PipelineStage::Completed));
}

#[tokio::test]
async fn sequential_run_honours_unit_selection() {
    let orchestrator = orchestrator(registry_with_builtins());
    let config = PipelineConfig::default()
        .sequential()
        .with_units(["technology-profiler", "contact-collector"]);

    let result = orchestrator.run(&scan(), &config).await;

    assert!(result.is_success());
    let order: Vec<&str> = result.results.iter().map(|r| r.unit_id()).collect();
    assert_eq!(order, vec!["technology-profiler", "contact-collector"]);
    assert!(result.result_for("infrastructure-mapper").is_none());
}

#[tokio::test]
async fn missing_osint_data_fails_before_any_unit_runs() {
    let orchestrator = orchestrator(registry_with_builtins());
    let mut scan = scan();
    scan.osint_data = None;

    let result = orchestrator.run(&scan, &PipelineConfig::default()).await;

    assert_eq!(result.stage, PipelineStage::Failed);
    assert!(!result.is_success());
    assert!(result.error.is_some());
    assert_eq!(result.attempted, 0);
    assert!(orchestrator.engine().recent_results().is_empty());
    assert!(matches!(
        PipelineOrchestrator::validate_scan(&scan),
        Err(IntelError::PipelineInput(_))
    ));
}

#[tokio::test]
async fn failing_unit_does_not_abort_the_run() {
    let registry = registry_with_builtins();
    registry
        .register(
            UnitDescriptor::new("breach-lookup", "Breach Lookup", "0.3.0")
                .with_category("security")
                .with_input("osint")
                .with_output("security"),
            FnUnit::new(|_, _| async { Err(UnitFailure::Message("quota exhausted".to_string())) })
                .into_shared(),
        )
        .unwrap();
    let orchestrator = orchestrator(registry);
    let config = PipelineConfig::default().with_units(["contact-collector", "breach-lookup", "not-registered"]);

    let result = orchestrator.run(&scan(), &config).await;

    assert_eq!(result.stage, PipelineStage::Completed);
    assert_eq!(result.attempted, 3);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 2);
    assert_eq!(
        result.result_for("not-registered").unwrap().error_kind(),
        Some(ErrorKind::Initialization)
    );
    assert_eq!(result.categorized.len(), 1);
    assert_eq!(result.categorized[0].unit_id, "contact-collector");
}

fn validator_without_config(_input: ExecutionInput, _ctx: ExecutionContext) -> std::future::Ready<ValidationOutcome> {
    panic!("validator config not loaded")
}

#[tokio::test]
async fn unit_panicking_in_validator_does_not_abort_the_run() {
    let registry = registry_with_builtins();
    registry
        .register(
            UnitDescriptor::new("cert-audit", "Certificate Audit", "0.1.0")
                .with_category("security")
                .with_input("osint")
                .with_output("security"),
            FnUnit::new(|_, _| async { Ok(IntelligenceData::new("security", vec![])) })
                .with_validator(validator_without_config)
                .into_shared(),
        )
        .unwrap();
    let orchestrator = orchestrator(registry);
    let config = PipelineConfig::default().with_units(["contact-collector", "cert-audit"]);

    let result = orchestrator.run(&scan(), &config).await;

    assert_eq!(result.stage, PipelineStage::Completed);
    assert_eq!(result.attempted, 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(
        result.result_for("cert-audit").unwrap().error_kind(),
        Some(ErrorKind::Runtime)
    );
    assert_eq!(orchestrator.engine().active_count(), 0);
}

#[tokio::test]
async fn panicking_observer_is_isolated() {
    let orchestrator = orchestrator(registry_with_builtins());
    orchestrator.subscribe(|_status: &PipelineStatus| panic!("dashboard crashed"));
    let statuses = record_statuses(&orchestrator);

    let result = orchestrator.run(&scan(), &PipelineConfig::default()).await;

    assert!(result.is_success());
    assert_eq!(statuses.lock().last().unwrap().stage, PipelineStage::Completed);
}

#[tokio::test]
async fn delivery_hands_items_to_sink() {
    let sink = RecordingSink::new(false);
    let orchestrator = orchestrator(registry_with_builtins()).with_sink(sink.clone());
    let statuses = record_statuses(&orchestrator);

    let result = orchestrator
        .run(&scan(), &PipelineConfig::default().with_delivery())
        .await;

    assert!(result.is_success());
    assert_eq!(sink.delivered.lock().len(), result.intelligence.len());
    assert!(statuses
        .lock()
        .iter()
        .any(|s| s.stage == PipelineStage::Delivering));
}

#[tokio::test]
async fn delivery_failure_marks_run_failed_but_keeps_results() {
    let orchestrator = orchestrator(registry_with_builtins()).with_sink(RecordingSink::new(true));

    let result = orchestrator
        .run(&scan(), &PipelineConfig::default().with_delivery())
        .await;

    assert_eq!(result.stage, PipelineStage::Failed);
    assert!(result.error.as_deref().unwrap().contains("store offline"));
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.categorized.len(), 3);
}

#[tokio::test]
async fn categorizer_accumulates_across_runs() {
    let orchestrator = orchestrator(registry_with_builtins());

    orchestrator.run(&scan(), &PipelineConfig::default()).await;
    orchestrator.run(&scan(), &PipelineConfig::default()).await;

    let categorizer = orchestrator.categorizer();
    assert_eq!(categorizer.len(), 6);
    let contacts = categorizer.filter(&FilterCriteria::new().with_category("contacts"));
    assert_eq!(contacts.len(), 2);

    let sorted = categorizer.sorted();
    assert!(sorted.windows(2).all(|w| w[0].priority >= w[1].priority));
    assert!(sorted.iter().any(|c| c.priority >= Priority::Medium));
}

#[tokio::test]
async fn categorizer_window_drops_oldest_runs() {
    let engine = Arc::new(ExecutionEngine::new(registry_with_builtins(), EngineConfig::default()).unwrap());
    let orchestrator = PipelineOrchestrator::new(engine, Arc::new(Categorizer::with_limit(4)));

    let first = orchestrator.run(&scan(), &PipelineConfig::default()).await;
    let second = orchestrator.run(&scan(), &PipelineConfig::default()).await;

    let categorizer = orchestrator.categorizer();
    assert_eq!(categorizer.len(), 4);
    let kept: Vec<String> = categorizer.all().into_iter().map(|c| c.id).collect();
    assert!(second.categorized.iter().all(|c| kept.contains(&c.id)));
    let first_kept = first.categorized.iter().filter(|c| kept.contains(&c.id)).count();
    assert_eq!(first_kept, 1);
}

#[test]
fn health_reflects_registry_contents() {
    let healthy = orchestrator(registry_with_builtins()).health_check();
    assert_eq!(healthy.status, HealthStatus::Healthy);
    assert!(healthy.checks.iter().all(|c| c.healthy));

    let empty = orchestrator(Arc::new(UnitRegistry::new())).health_check();
    assert_eq!(empty.status, HealthStatus::Unhealthy);
    assert!(!empty.checks.iter().find(|c| c.name == "registry").unwrap().healthy);
}

#[tokio::test]
async fn empty_unit_selection_fails_the_run() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            UnitDescriptor::new("opt-in", "Opt In", "1.0.0")
                .with_input("osint")
                .with_output("general")
                .disabled_by_default(),
            FnUnit::new(|_, _| async { Ok(IntelligenceData::new("general", vec![])) }).into_shared(),
        )
        .unwrap();
    let orchestrator = orchestrator(registry);

    let result = orchestrator.run(&scan(), &PipelineConfig::default()).await;

    assert_eq!(result.stage, PipelineStage::Failed);
    assert_eq!(result.attempted, 0);
}
