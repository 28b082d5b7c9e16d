use intelflow::error::IntelError;
use intelflow::executor::{ExecutionEngine, ExecutionEvent};
use intelflow::models::{ExecutionInput, IntelligenceData, UnitDescriptor};
use intelflow::registry::UnitRegistry;
use intelflow::units::{register_builtins, FnUnit};
use intelflow::ExecutionOptions;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn descriptor(id: &str, category: &str) -> UnitDescriptor {
    UnitDescriptor::new(id, format!("{} unit", id), "2.1.0")
        .with_category(category)
        .with_tag("Passive")
        .with_input("osint")
        .with_output(category)
}

fn slow_unit(delay: Duration) -> FnUnit {
    FnUnit::new(move |_, _| async move {
        tokio::time::sleep(delay).await;
        Ok(IntelligenceData::new("general", vec![json!("done")]).with_confidence(0.5))
    })
}

#[test]
fn register_then_get_round_trips_identity() {
    let registry = UnitRegistry::new();
    registry
        .register(descriptor("whois-lookup", "infrastructure"), FnUnit::noop())
        .unwrap();

    let stored = registry.get("whois-lookup").unwrap();
    assert_eq!(stored.id, "whois-lookup");
    assert_eq!(stored.name, "whois-lookup unit");
    assert_eq!(stored.version, "2.1.0");
    assert_eq!(registry.len(), 1);
    assert!(registry.get("missing").is_none());
}

#[test]
fn search_and_category_lookup() {
    let registry = UnitRegistry::new();
    registry
        .register(descriptor("email-harvester", "contacts"), FnUnit::noop())
        .unwrap();
    registry
        .register(descriptor("cms-fingerprint", "technology"), FnUnit::noop())
        .unwrap();
    registry
        .register(
            descriptor("port-scanner", "infrastructure").disabled_by_default(),
            FnUnit::noop(),
        )
        .unwrap();

    assert_eq!(registry.list_all().len(), 3);
    assert_eq!(registry.search("HARVEST").len(), 1);
    assert_eq!(registry.search("passive").len(), 3);
    assert!(registry.search("nothing-like-this").is_empty());

    let technology = registry.list_by_category("Technology");
    assert_eq!(technology.len(), 1);
    assert_eq!(technology[0].id, "cms-fingerprint");

    let defaults: Vec<String> = registry.default_units().into_iter().map(|d| d.id).collect();
    assert!(!defaults.contains(&"port-scanner".to_string()));
    assert_eq!(defaults.len(), 2);
}

#[test]
fn builtins_register_once_each() {
    let registry = UnitRegistry::new();
    let registered = register_builtins(&registry).unwrap();

    assert_eq!(registered, registry.len());
    assert!(registry.contains("contact-collector"));
    assert!(registry.contains("technology-profiler"));
    assert!(registry.contains("infrastructure-mapper"));
}

#[test]
fn registration_emits_event() {
    let registry = UnitRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    registry.events().subscribe(move |event: &ExecutionEvent| {
        sink.lock().push(event.name().to_string());
    });

    registry.register(descriptor("dns", "infrastructure"), FnUnit::noop()).unwrap();

    assert_eq!(*seen.lock(), vec!["unit-registered".to_string()]);
}

#[tokio::test]
async fn stats_track_completed_executions() {
    let registry = Arc::new(UnitRegistry::new());
    registry.register(descriptor("fast", "contacts"), FnUnit::noop()).unwrap();
    let engine = ExecutionEngine::with_defaults(registry.clone());
    let input = ExecutionInput::new(json!({}), "test", "https://example.com");

    assert_eq!(registry.stats("fast").unwrap().executions, 0);
    for _ in 0..3 {
        assert!(engine.execute("fast", &input, &ExecutionOptions::default()).await.success);
    }

    let stats = registry.stats("fast").unwrap();
    assert_eq!(stats.executions, 3);
    assert_eq!(stats.successes, 3);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.success_rate, 1.0);
    assert!(stats.last_executed.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unregister_refused_while_execution_in_flight() {
    let registry = Arc::new(UnitRegistry::new());
    registry
        .register(
            descriptor("slow", "contacts"),
            slow_unit(Duration::from_millis(300)).into_shared(),
        )
        .unwrap();
    let engine = Arc::new(ExecutionEngine::with_defaults(registry.clone()));

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let input = ExecutionInput::new(json!({}), "test", "https://example.com");
            engine.execute("slow", &input, &ExecutionOptions::default()).await
        })
    };

    while registry.active_executions("slow") == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(!registry.unregister("slow"));
    assert!(registry.contains("slow"));
    let err = registry
        .register(descriptor("slow", "contacts"), FnUnit::noop())
        .unwrap_err();
    assert!(matches!(err, IntelError::ActiveExecutions { active: 1, .. }));

    let result = running.await.unwrap();
    assert!(result.success);
    assert_eq!(registry.active_executions("slow"), 0);
    assert!(registry.unregister("slow"));
    assert!(!registry.contains("slow"));
}
