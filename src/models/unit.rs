use crate::executor::ExecutionContext;
use crate::models::error_kind::ErrorKind;
use crate::models::input::ExecutionInput;
use crate::models::result::{ExecutionFailure, IntelligenceData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

pub type UnitFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type UnitResult = Result<IntelligenceData, UnitFailure>;

/// Failure as reported by a unit, before the engine normalizes it.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitFailure {
    /// Fully classified failure, passed through unchanged.
    Structured(ExecutionFailure),
    /// The unit reported no success and gave no reason.
    Unspecified,
    /// Free-form error text, preserved as the failure details.
    Message(String),
}

impl From<ExecutionFailure> for UnitFailure {
    fn from(failure: ExecutionFailure) -> Self {
        UnitFailure::Structured(failure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub failed_checks: Vec<String>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self {
            valid: true,
            failed_checks: Vec::new(),
        }
    }

    pub fn failed<I, S>(checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid: false,
            failed_checks: checks.into_iter().map(Into::into).collect(),
        }
    }

    /// Collects named checks; any `false` fails validation.
    pub fn from_checks(checks: &[(&str, bool)]) -> Self {
        let failed: Vec<String> = checks
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name.to_string())
            .collect();

        if failed.is_empty() {
            Self::passed()
        } else {
            Self::failed(failed)
        }
    }
}

/// Capability set every analysis unit exposes to the engine.
pub trait AnalysisUnit: Send + Sync {
    /// Optional pre-flight check. Returning `None` means the unit declares no validation.
    fn validate<'a>(
        &'a self,
        _input: &'a ExecutionInput,
        _ctx: &'a ExecutionContext,
    ) -> Option<UnitFuture<'a, ValidationOutcome>> {
        None
    }

    fn execute<'a>(
        &'a self,
        input: &'a ExecutionInput,
        ctx: &'a ExecutionContext,
    ) -> UnitFuture<'a, UnitResult>;

    /// Optional teardown, run after every attempt regardless of outcome.
    fn cleanup<'a>(&'a self, _ctx: &'a ExecutionContext) -> Option<UnitFuture<'a, Result<(), String>>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    List,
    Object,
}

impl ParameterType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::List => value.is_array(),
            ParameterType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::List => "list",
            ParameterType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParameter {
    pub name: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ConfigParameter {
    pub fn optional(name: impl Into<String>, param_type: ParameterType, default: Value) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default),
            description: None,
        }
    }

    pub fn required(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declarative identity and contract of an analysis unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub input_types: Vec<String>,
    pub output_types: Vec<String>,
    pub config_schema: Vec<ConfigParameter>,
    pub enabled_by_default: bool,
    pub timeout_ms: Option<u64>,
}

impl UnitDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            category: "general".to_string(),
            tags: Vec::new(),
            input_types: Vec::new(),
            output_types: Vec::new(),
            config_schema: Vec::new(),
            enabled_by_default: true,
            timeout_ms: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_input(mut self, input_type: impl Into<String>) -> Self {
        self.input_types.push(input_type.into());
        self
    }

    pub fn with_output(mut self, output_type: impl Into<String>) -> Self {
        self.output_types.push(output_type.into());
        self
    }

    pub fn with_parameter(mut self, parameter: ConfigParameter) -> Self {
        self.config_schema.push(parameter);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    /// Case-insensitive substring match across id, name and tags.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.id.to_lowercase().contains(&needle)
            || self.name.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }

    /// Structural checks applied at registration.
    pub fn check(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("descriptor id is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("descriptor name is required for '{}'", self.id));
        }
        if self.input_types.is_empty() {
            return Err(format!("unit '{}' declares no input types", self.id));
        }
        if self.output_types.is_empty() {
            return Err(format!("unit '{}' declares no output types", self.id));
        }
        Ok(())
    }

    /// Fills schema defaults and checks overrides against declared types.
    pub fn resolve_parameters(&self, overrides: &Map<String, Value>) -> Result<Map<String, Value>, ExecutionFailure> {
        let mut resolved = Map::new();

        for param in &self.config_schema {
            let value = overrides.get(&param.name).or(param.default.as_ref());
            match value {
                Some(value) if param.param_type.matches(value) => {
                    resolved.insert(param.name.clone(), value.clone());
                }
                Some(value) => {
                    return Err(ExecutionFailure::new(
                        ErrorKind::Configuration,
                        format!(
                            "parameter '{}' expects {}",
                            param.name,
                            param.param_type.as_str()
                        ),
                    )
                    .with_context("parameter", param.name.clone())
                    .with_context("value", value.clone()));
                }
                None if param.required => {
                    return Err(ExecutionFailure::new(
                        ErrorKind::Configuration,
                        format!("required parameter '{}' is missing", param.name),
                    )
                    .with_context("parameter", param.name.clone()));
                }
                None => {}
            }
        }

        // Undeclared overrides are passed through untouched.
        for (key, value) in overrides {
            resolved.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Ok(resolved)
    }
}
