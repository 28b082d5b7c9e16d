use crate::executor::ExecutionContext;
use crate::models::{
    AnalysisUnit, ExecutionInput, IntelligenceData, Relationship, UnitDescriptor, UnitFuture,
    UnitResult, ValidationOutcome,
};
use crate::units::{host_of, payload_bytes};
use serde_json::json;

pub const TECHNOLOGY_PROFILER_ID: &str = "technology-profiler";

// Response headers that disclose software on the serving stack.
const DISCLOSING_HEADERS: &[&str] = &["server", "x-powered-by", "x-generator", "x-aspnet-version"];

/// Builds a technology profile from detected technologies and disclosing headers.
pub struct TechnologyProfiler;

impl TechnologyProfiler {
    pub fn descriptor() -> UnitDescriptor {
        UnitDescriptor::new(TECHNOLOGY_PROFILER_ID, "Technology Profiler", "1.0.0")
            .with_description("Profiles the software stack detected on the target")
            .with_category("technology")
            .with_tag("stack")
            .with_tag("fingerprint")
            .with_input("osint")
            .with_output("technology")
    }
}

fn split_product(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim();
    match raw.split_once('/') {
        Some((name, version)) => (name.trim().to_string(), Some(version.trim().to_string())),
        None => (raw.to_string(), None),
    }
}

impl AnalysisUnit for TechnologyProfiler {
    fn validate<'a>(
        &'a self,
        input: &'a ExecutionInput,
        _ctx: &'a ExecutionContext,
    ) -> Option<UnitFuture<'a, ValidationOutcome>> {
        Some(Box::pin(async move {
            ValidationOutcome::from_checks(&[("payload-is-object", input.payload.is_object())])
        }))
    }

    fn execute<'a>(
        &'a self,
        input: &'a ExecutionInput,
        ctx: &'a ExecutionContext,
    ) -> UnitFuture<'a, UnitResult> {
        Box::pin(async move {
            ctx.report_memory(payload_bytes(input));
            let osint = input.osint().unwrap_or_default();
            let host = host_of(&input.metadata.target);

            let mut items = Vec::new();
            let mut names: Vec<String> = Vec::new();

            for tech in &osint.technologies {
                let (name, version) = split_product(tech);
                if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    continue;
                }
                items.push(json!({"name": name, "version": version, "evidence": "detected"}));
                names.push(name);
            }

            for (header, value) in &osint.server_info {
                if !DISCLOSING_HEADERS.contains(&header.to_lowercase().as_str()) {
                    continue;
                }
                let (name, version) = split_product(value);
                if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    continue;
                }
                items.push(json!({"name": name, "version": version, "evidence": header}));
                names.push(name);
            }

            let mut data = IntelligenceData::new("technology", items);
            for name in &names {
                data = data.with_relationship(Relationship::new(host.clone(), name.clone(), "uses").with_confidence(0.8));
            }

            // Header-only evidence is weaker than explicit detection.
            let confidence = if osint.technologies.is_empty() {
                input.metadata.confidence * 0.7
            } else {
                input.metadata.confidence
            };

            Ok(data.with_confidence(confidence).with_source(input.source.clone()))
        })
    }
}
