use crate::error::IntelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_executions: usize,
    pub default_timeout_ms: u64,
    pub memory_limit_bytes: u64,
    pub cleanup_timeout_ms: u64,
    pub metrics_window: usize,
    pub history_limit: usize,
    pub per_unit_history_limit: usize,
    pub sandbox: SandboxPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            cleanup_timeout_ms: 5_000,
            metrics_window: 100,
            history_limit: 50,
            per_unit_history_limit: 20,
            sandbox: SandboxPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with `INTELFLOW_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max) = env_number("INTELFLOW_MAX_CONCURRENT") {
            config.max_concurrent_executions = max as usize;
        }
        if let Some(timeout) = env_number("INTELFLOW_TIMEOUT_MS") {
            config.default_timeout_ms = timeout;
        }
        if let Some(mb) = env_number("INTELFLOW_MEMORY_LIMIT_MB") {
            config.memory_limit_bytes = mb * 1024 * 1024;
        }

        config
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_executions = max;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxPolicy) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_history_limits(mut self, overall: usize, per_unit: usize) -> Self {
        self.history_limit = overall;
        self.per_unit_history_limit = per_unit;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), IntelError> {
        if self.max_concurrent_executions == 0 {
            return Err(IntelError::Config(
                "max_concurrent_executions must be greater than 0".to_string(),
            ));
        }

        if self.default_timeout_ms == 0 {
            return Err(IntelError::Config("Timeout must be greater than 0".to_string()));
        }

        if self.metrics_window == 0 || self.history_limit == 0 || self.per_unit_history_limit == 0 {
            return Err(IntelError::Config(
                "history and metrics windows must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_number(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    DynamicEval,
    StorageClear,
    GlobalAccess,
    NetworkAccess,
    FileSystem,
    ProcessSpawn,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::DynamicEval => "dynamic-eval",
            Capability::StorageClear => "storage-clear",
            Capability::GlobalAccess => "global-access",
            Capability::NetworkAccess => "network-access",
            Capability::FileSystem => "file-system",
            Capability::ProcessSpawn => "process-spawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    pub disallowed_capabilities: Vec<Capability>,
    pub blocked_globals: Vec<String>,
    /// Exact hosts, `*.suffix` wildcards, or `*` for any host.
    pub allowed_hosts: Vec<String>,
    pub enforce_memory_limit: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            disallowed_capabilities: vec![
                Capability::DynamicEval,
                Capability::StorageClear,
                Capability::GlobalAccess,
            ],
            blocked_globals: vec![
                "eval".to_string(),
                "Function".to_string(),
                "localStorage.clear".to_string(),
                "sessionStorage.clear".to_string(),
            ],
            allowed_hosts: Vec::new(),
            enforce_memory_limit: false,
        }
    }
}

impl SandboxPolicy {
    pub fn permissive() -> Self {
        Self {
            disallowed_capabilities: vec![],
            blocked_globals: vec![],
            allowed_hosts: vec!["*".to_string()],
            enforce_memory_limit: false,
        }
    }

    pub fn restrictive() -> Self {
        Self {
            disallowed_capabilities: vec![
                Capability::DynamicEval,
                Capability::StorageClear,
                Capability::GlobalAccess,
                Capability::NetworkAccess,
                Capability::FileSystem,
                Capability::ProcessSpawn,
            ],
            blocked_globals: SandboxPolicy::default().blocked_globals,
            allowed_hosts: vec![],
            enforce_memory_limit: true,
        }
    }

    pub fn with_allowed_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.push(host.into());
        self
    }

    pub fn allows_capability(&self, capability: Capability) -> bool {
        !self.disallowed_capabilities.contains(&capability)
    }

    pub fn allows_global(&self, name: &str) -> bool {
        self.allows_capability(Capability::GlobalAccess)
            || !self.blocked_globals.iter().any(|g| g == name)
    }

    pub fn allows_host(&self, host: &str) -> bool {
        if !self.allows_capability(Capability::NetworkAccess) {
            return false;
        }

        let host = host.trim().to_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            let allowed = allowed.to_lowercase();
            if allowed == "*" {
                true
            } else if let Some(suffix) = allowed.strip_prefix("*.") {
                host == suffix || host.ends_with(&format!(".{}", suffix))
            } else {
                host == allowed
            }
        })
    }
}

/// Per-call overrides handed to `ExecutionEngine::execute`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub timeout_ms: Option<u64>,
    pub memory_limit_bytes: Option<u64>,
    pub parameters: Map<String, Value>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}
