use crate::executor::ExecutionContext;
use crate::models::{
    AnalysisUnit, ConfigParameter, ExecutionInput, IntelligenceData, ParameterType, Relationship,
    UnitDescriptor, UnitFuture, UnitResult, ValidationOutcome,
};
use crate::units::{host_of, payload_bytes};
use serde_json::{json, Value};

pub const CONTACT_COLLECTOR_ID: &str = "contact-collector";

/// Lifts scanned e-mail addresses and social profiles into contact intelligence.
pub struct ContactCollector;

impl ContactCollector {
    pub fn descriptor() -> UnitDescriptor {
        UnitDescriptor::new(CONTACT_COLLECTOR_ID, "Contact Collector", "1.0.0")
            .with_description("Collects e-mail addresses and social profiles found on the target")
            .with_category("contacts")
            .with_tag("email")
            .with_tag("social")
            .with_input("osint")
            .with_output("contacts")
            .with_parameter(ConfigParameter::optional(
                "includeSocial",
                ParameterType::Boolean,
                json!(true),
            ))
            .with_parameter(
                ConfigParameter::optional("maxItems", ParameterType::Number, json!(200))
                    .with_description("Upper bound on emitted contacts"),
            )
    }
}

fn email_domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|domain| !domain.is_empty())
}

fn social_platform(link: &str) -> String {
    let host = host_of(link);
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host.split('.').next().unwrap_or("unknown").to_string()
}

impl AnalysisUnit for ContactCollector {
    fn validate<'a>(
        &'a self,
        input: &'a ExecutionInput,
        _ctx: &'a ExecutionContext,
    ) -> Option<UnitFuture<'a, ValidationOutcome>> {
        Some(Box::pin(async move {
            ValidationOutcome::from_checks(&[
                ("payload-is-object", input.payload.is_object()),
                ("emails-present", input.payload_field("emails").is_some()),
            ])
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
            let include_social = ctx
                .parameter("includeSocial")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let max_items = ctx
                .parameter("maxItems")
                .and_then(Value::as_u64)
                .unwrap_or(200) as usize;
            let target_host = host_of(&input.metadata.target);

            let mut items = Vec::new();
            let mut relationships = Vec::new();
            let mut seen = std::collections::BTreeSet::new();

            for email in &osint.emails {
                let email = email.trim().to_lowercase();
                if email.is_empty() || !seen.insert(email.clone()) {
                    continue;
                }
                let domain = email_domain(&email);
                if let Some(ref domain) = domain {
                    if !target_host.is_empty()
                        && (target_host == *domain || target_host.ends_with(&format!(".{}", domain)))
                    {
                        relationships.push(
                            Relationship::new(email.clone(), target_host.clone(), "belongs-to")
                                .with_confidence(0.9),
                        );
                    }
                }
                items.push(json!({"type": "email", "value": email, "domain": domain}));
            }

            if include_social {
                for link in &osint.social_links {
                    if seen.insert(link.clone()) {
                        items.push(json!({
                            "type": "social",
                            "value": link,
                            "platform": social_platform(link),
                        }));
                    }
                }
            }

            let mut data = IntelligenceData::new("contacts", Vec::new());
            if items.len() > max_items {
                data = data.with_note(format!("truncated {} contacts to {}", items.len(), max_items));
                items.truncate(max_items);
            }
            if osint.emails.is_empty() {
                data = data.with_note("no e-mail addresses in scan");
            }

            // Address-backed contact sets are trusted at the scanner's level; social-only sets less so.
            let confidence = if osint.emails.is_empty() {
                input.metadata.confidence * 0.75
            } else {
                input.metadata.confidence
            };

            data.items = items;
            data.relationships = relationships;
            Ok(data.with_confidence(confidence).with_source(input.source.clone()))
        })
    }
}
