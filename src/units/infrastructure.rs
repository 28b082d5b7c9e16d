use crate::executor::ExecutionContext;
use crate::models::{
    AnalysisUnit, ConfigParameter, ExecutionInput, IntelligenceData, ParameterType, Relationship,
    UnitDescriptor, UnitFuture, UnitResult,
};
use crate::units::{host_of, payload_bytes};
use serde_json::{json, Value};

pub const INFRASTRUCTURE_MAPPER_ID: &str = "infrastructure-mapper";

/// Maps subdomains and server headers of the target.
pub struct InfrastructureMapper;

impl InfrastructureMapper {
    pub fn descriptor() -> UnitDescriptor {
        UnitDescriptor::new(INFRASTRUCTURE_MAPPER_ID, "Infrastructure Mapper", "1.0.0")
            .with_description("Maps subdomains and server configuration of the target")
            .with_category("infrastructure")
            .with_tag("dns")
            .with_tag("subdomain")
            .with_input("osint")
            .with_output("infrastructure")
            .with_parameter(ConfigParameter::optional(
                "includeHeaders",
                ParameterType::Boolean,
                json!(true),
            ))
    }
}

impl AnalysisUnit for InfrastructureMapper {
    fn execute<'a>(
        &'a self,
        input: &'a ExecutionInput,
        ctx: &'a ExecutionContext,
    ) -> UnitFuture<'a, UnitResult> {
        Box::pin(async move {
            ctx.report_memory(payload_bytes(input));
            let osint = input.osint().unwrap_or_default();
            let include_headers = ctx
                .parameter("includeHeaders")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let host = host_of(&input.metadata.target);

            let mut subdomains: Vec<String> = osint
                .subdomains
                .iter()
                .map(|s| s.trim().trim_end_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            subdomains.sort();
            subdomains.dedup();

            let mut data = IntelligenceData::new("infrastructure", Vec::new());
            for subdomain in &subdomains {
                data.items.push(json!({"type": "subdomain", "value": subdomain}));
                if !host.is_empty() && subdomain != &host {
                    data = data.with_relationship(
                        Relationship::new(subdomain.clone(), host.clone(), "subdomain-of").with_confidence(0.9),
                    );
                }
            }

            if include_headers {
                for (name, value) in &osint.server_info {
                    data.items.push(json!({"type": "header", "name": name.to_lowercase(), "value": value}));
                }
            }

            if subdomains.is_empty() {
                data = data.with_note("no subdomains discovered");
            }

            let confidence = input.metadata.confidence * if subdomains.is_empty() { 0.6 } else { 1.0 };
            Ok(data.with_confidence(confidence).with_source(input.source.clone()))
        })
    }
}
