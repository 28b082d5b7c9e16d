// Units module - closure-backed and built-in analysis units

pub mod contacts;
pub mod function;
pub mod infrastructure;
pub mod technology;

pub use contacts::{ContactCollector, CONTACT_COLLECTOR_ID};
pub use function::FnUnit;
pub use infrastructure::{InfrastructureMapper, INFRASTRUCTURE_MAPPER_ID};
pub use technology::{TechnologyProfiler, TECHNOLOGY_PROFILER_ID};

use crate::error::Result;
use crate::models::{AnalysisUnit, ExecutionInput, UnitDescriptor};
use crate::registry::UnitRegistry;
use std::sync::Arc;

/// Descriptor and implementation of every built-in unit.
pub fn builtin_units() -> Vec<(UnitDescriptor, Arc<dyn AnalysisUnit>)> {
    vec![
        (ContactCollector::descriptor(), Arc::new(ContactCollector)),
        (TechnologyProfiler::descriptor(), Arc::new(TechnologyProfiler)),
        (InfrastructureMapper::descriptor(), Arc::new(InfrastructureMapper)),
    ]
}

pub fn register_builtins(registry: &UnitRegistry) -> Result<usize> {
    let units = builtin_units();
    let count = units.len();
    for (descriptor, unit) in units {
        registry.register(descriptor, unit)?;
    }
    Ok(count)
}

/// Lowercased host part of a URL, without scheme, credentials, port or path.
pub(crate) fn host_of(url: &str) -> String {
    let rest = url.trim();
    let rest = rest.split_once("://").map(|(_, r)| r).unwrap_or(rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let authority = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    authority
        .split(':')
        .next()
        .unwrap_or("")
        .trim_end_matches('.')
        .to_lowercase()
}

/// Rough in-memory size of the payload, reported as the unit's working set.
pub(crate) fn payload_bytes(input: &ExecutionInput) -> u64 {
    serde_json::to_vec(&input.payload)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(0)
}
