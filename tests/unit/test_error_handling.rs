use intelflow::error::IntelError;
use intelflow::executor::runner::FLAG_CLEANUP_FAILED;
use intelflow::executor::{ExecutionContext, ExecutionEngine};
use intelflow::models::{
    ErrorFamily, ErrorKind, ExecutionFailure, ExecutionInput, IntelligenceData, Relationship,
    UnitDescriptor, UnitFailure, ValidationOutcome,
};
use intelflow::registry::UnitRegistry;
use intelflow::units::FnUnit;
use intelflow::ExecutionOptions;
use serde_json::json;
use std::future::Ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn descriptor(id: &str) -> UnitDescriptor {
    UnitDescriptor::new(id, id, "1.0.0")
        .with_input("osint")
        .with_output("general")
}

fn validator_without_state(_input: ExecutionInput, _ctx: ExecutionContext) -> Ready<ValidationOutcome> {
    panic!("validator state missing")
}

fn cleanup_without_handle(_ctx: ExecutionContext) -> Ready<Result<(), String>> {
    panic!("cleanup handle already closed")
}

fn input() -> ExecutionInput {
    ExecutionInput::new(json!({}), "test", "https://example.com")
}

#[test]
fn exit_codes_follow_error_class() {
    assert_eq!(IntelError::InvalidArguments("bad flag".into()).exit_code(), 2);
    assert_eq!(IntelError::Config("zero slots".into()).exit_code(), 2);
    assert_eq!(IntelError::PipelineInput("empty".into()).exit_code(), 4);
    assert_eq!(
        IntelError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")).exit_code(),
        4
    );
    assert_eq!(IntelError::Delivery("refused".into()).exit_code(), 1);
    assert_eq!(IntelError::Categorization("inconsistent".into()).exit_code(), 1);
}

#[test]
fn error_codes_round_trip_through_lookup() {
    for kind in ErrorKind::ALL {
        assert_eq!(ErrorKind::from_code(kind.code()), Some(*kind), "code {}", kind.code());
    }
    assert_eq!(ErrorKind::from_code("NOT_A_CODE"), None);
}

#[test]
fn families_group_codes_by_prefix() {
    assert_eq!(ErrorKind::Timeout.family(), ErrorFamily::Execution);
    assert_eq!(ErrorKind::DataEmpty.family(), ErrorFamily::Data);
    assert_eq!(ErrorKind::IntegrationQuota.family(), ErrorFamily::Integration);
    assert_eq!(ErrorKind::DnsResolution.family(), ErrorFamily::Network);
}

#[test]
fn recoverable_kinds_carry_backoff() {
    let timeout = ExecutionFailure::new(ErrorKind::Timeout, "too slow");
    assert!(timeout.recoverable);
    assert_eq!(timeout.retry_after_ms, Some(5_000));
    assert!(!timeout.suggestions.is_empty());

    let rate_limited = ExecutionFailure::new(ErrorKind::RateLimit, "throttled");
    assert!(rate_limited.recoverable);
    assert_eq!(rate_limited.retry_after_ms, Some(60_000));

    let runtime = ExecutionFailure::new(ErrorKind::Runtime, "boom");
    assert!(!runtime.recoverable);
    assert_eq!(runtime.retry_after_ms, None);
}

#[test]
fn registering_incomplete_descriptor_is_an_initialization_error() {
    let registry = UnitRegistry::new();
    let incomplete = UnitDescriptor::new("no-io", "No IO", "1.0.0");

    let err = registry.register(incomplete, FnUnit::noop()).unwrap_err();
    assert!(matches!(err, IntelError::Initialization(_)));
    assert!(!registry.contains("no-io"));
}

#[tokio::test]
async fn unit_failures_are_normalized() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("silent"),
            FnUnit::new(|_, _| async { Err(UnitFailure::Unspecified) }).into_shared(),
        )
        .unwrap();
    registry
        .register(
            descriptor("chatty"),
            FnUnit::new(|_, _| async { Err(UnitFailure::Message("socket closed".to_string())) })
                .into_shared(),
        )
        .unwrap();
    registry
        .register(
            descriptor("classified"),
            FnUnit::new(|_, _| async {
                Err(UnitFailure::Structured(ExecutionFailure::new(
                    ErrorKind::DnsResolution,
                    "no such host",
                )))
            })
            .into_shared(),
        )
        .unwrap();
    let engine = ExecutionEngine::with_defaults(registry);
    let options = ExecutionOptions::default();

    let silent = engine.execute("silent", &input(), &options).await;
    assert_eq!(silent.error_kind(), Some(ErrorKind::Runtime));

    let chatty = engine.execute("chatty", &input(), &options).await;
    let failure = chatty.error.unwrap();
    assert_eq!(failure.kind, ErrorKind::Runtime);
    assert_eq!(failure.details.as_deref(), Some("socket closed"));

    let classified = engine.execute("classified", &input(), &options).await;
    assert_eq!(classified.error_kind(), Some(ErrorKind::DnsResolution));
    assert!(classified.is_recoverable());
}

#[tokio::test]
async fn panicking_unit_becomes_runtime_failure() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("panicky"),
            FnUnit::new(|_, _| async { panic!("index out of bounds") }).into_shared(),
        )
        .unwrap();
    let engine = ExecutionEngine::with_defaults(registry.clone());

    let result = engine.execute("panicky", &input(), &ExecutionOptions::default()).await;

    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.kind, ErrorKind::Runtime);
    assert_eq!(failure.details.as_deref(), Some("index out of bounds"));
    assert_eq!(engine.active_count(), 0);
    assert_eq!(registry.stats("panicky").unwrap().failures, 1);
}

#[tokio::test]
async fn validator_panicking_before_its_future_is_contained() {
    let executed = Arc::new(AtomicBool::new(false));
    let flag = executed.clone();
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("strict"),
            FnUnit::new(move |_, _| {
                flag.store(true, Ordering::SeqCst);
                async { Ok(IntelligenceData::new("general", vec![json!(1)])) }
            })
            .with_validator(validator_without_state)
            .into_shared(),
        )
        .unwrap();
    let engine = ExecutionEngine::with_defaults(registry.clone());

    let result = engine.execute("strict", &input(), &ExecutionOptions::default()).await;

    assert!(!result.success);
    let failure = result.error.unwrap();
    assert_eq!(failure.kind, ErrorKind::Runtime);
    assert_eq!(failure.details.as_deref(), Some("validator state missing"));
    assert!(!executed.load(Ordering::SeqCst));
    assert_eq!(engine.active_count(), 0);
    assert_eq!(registry.active_executions("strict"), 0);
    assert_eq!(registry.stats("strict").unwrap().failures, 1);
    assert_eq!(engine.recent_results().len(), 1);
}

#[tokio::test]
async fn cleanup_panicking_before_its_future_keeps_success() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("leaky"),
            FnUnit::new(|_, _| async {
                Ok(IntelligenceData::new("general", vec![json!("a")]).with_confidence(0.9))
            })
            .with_cleanup(cleanup_without_handle)
            .into_shared(),
        )
        .unwrap();
    let engine = ExecutionEngine::with_defaults(registry.clone());

    let result = engine.execute("leaky", &input(), &ExecutionOptions::default()).await;

    assert!(result.success);
    assert!(result.metadata.has_flag(FLAG_CLEANUP_FAILED));
    let cleanup = result.metadata.steps.iter().find(|s| s.name == "cleanup").unwrap();
    assert!(!cleanup.success);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(registry.stats("leaky").unwrap().successes, 1);
}

#[tokio::test]
async fn out_of_range_confidence_is_clamped() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("overconfident"),
            FnUnit::new(|_, _| async {
                let mut data = IntelligenceData::new("general", vec![json!("a")]);
                data.confidence = 7.5;
                let mut link = Relationship::new("a.example.com", "b.example.com", "same-domain");
                link.confidence = -3.0;
                data.relationships.push(link);
                Ok(data)
            })
            .into_shared(),
        )
        .unwrap();
    registry
        .register(
            descriptor("undecided"),
            FnUnit::new(|_, _| async {
                let mut data = IntelligenceData::new("general", vec![json!("a")]);
                data.confidence = f64::NAN;
                Ok(data)
            })
            .into_shared(),
        )
        .unwrap();
    let engine = ExecutionEngine::with_defaults(registry);

    let high = engine.execute("overconfident", &input(), &ExecutionOptions::default()).await;
    assert!(high.success);
    assert_eq!(high.confidence(), 1.0);
    assert_eq!(high.data.as_ref().unwrap().relationships[0].confidence, 0.0);
    assert_eq!(high.metadata.quality_score, 100.0);

    let nan = engine.execute("undecided", &input(), &ExecutionOptions::default()).await;
    assert!(nan.success);
    assert_eq!(nan.confidence(), 0.0);
}
