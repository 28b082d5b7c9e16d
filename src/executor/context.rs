use crate::executor::config::{Capability, SandboxPolicy};
use crate::models::{ErrorKind, ExecutionFailure};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct ResourceCounters {
    peak_memory_bytes: AtomicU64,
    network_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub peak_memory_bytes: u64,
    pub network_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Resource envelope and sandbox view handed to a unit for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: String,
    unit_id: String,
    target: String,
    timeout: Duration,
    memory_limit_bytes: u64,
    sandbox: Arc<SandboxPolicy>,
    parameters: Map<String, Value>,
    counters: Arc<ResourceCounters>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        unit_id: impl Into<String>,
        target: impl Into<String>,
        timeout: Duration,
        memory_limit_bytes: u64,
        sandbox: Arc<SandboxPolicy>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            unit_id: unit_id.into(),
            target: target.into(),
            timeout,
            memory_limit_bytes,
            sandbox,
            parameters,
            counters: Arc::new(ResourceCounters::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Context for driving a unit directly, outside the engine.
    pub fn detached(unit_id: impl Into<String>) -> Self {
        Self::new(
            "detached",
            unit_id,
            "",
            Duration::from_secs(10),
            crate::executor::config::DEFAULT_MEMORY_LIMIT_BYTES,
            Arc::new(SandboxPolicy::default()),
            Map::new(),
        )
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_bytes
    }

    pub fn sandbox(&self) -> &SandboxPolicy {
        &self.sandbox
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn check_capability(&self, capability: Capability) -> Result<(), ExecutionFailure> {
        if self.sandbox.allows_capability(capability) {
            Ok(())
        } else {
            Err(ExecutionFailure::new(
                ErrorKind::Security,
                format!("capability '{}' is disallowed by the sandbox", capability.as_str()),
            )
            .with_context("capability", capability.as_str()))
        }
    }

    pub fn check_global(&self, name: &str) -> Result<(), ExecutionFailure> {
        if self.sandbox.allows_global(name) {
            Ok(())
        } else {
            Err(ExecutionFailure::new(
                ErrorKind::Security,
                format!("access to global '{}' is disallowed", name),
            )
            .with_context("global", name))
        }
    }

    /// Checks the host against the allow-list and counts the request when permitted.
    pub fn check_network(&self, host: &str) -> Result<(), ExecutionFailure> {
        if !self.sandbox.allows_host(host) {
            return Err(ExecutionFailure::new(
                ErrorKind::Permission,
                format!("network access to '{}' is not on the allow-list", host),
            )
            .with_context("host", host));
        }
        self.counters.network_requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_cache_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Memory use is self-reported; the engine keeps the peak.
    pub fn report_memory(&self, bytes: u64) {
        self.counters.peak_memory_bytes.fetch_max(bytes, Ordering::Relaxed);
    }

    pub fn usage(&self) -> ResourceUsage {
        ResourceUsage {
            peak_memory_bytes: self.counters.peak_memory_bytes.load(Ordering::Relaxed),
            network_requests: self.counters.network_requests.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Token cancelled once the engine stops waiting on this execution.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}
