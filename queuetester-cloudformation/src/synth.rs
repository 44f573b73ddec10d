//! Template synthesis and rendering

use std::fmt;
use std::str::FromStr;
use tracing::info;

use queuetester_core::{ErrorCode, Stack, StackError, Template};

/// Rendering of a synthesized template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("Unknown output format '{}', expected json or yaml", other)),
        }
    }
}

/// Produce the stack's template, failing if any reference or dependency
/// points at something that was never declared
pub fn synthesize(stack: &Stack) -> Result<Template, StackError> {
    let template = stack.template().clone();
    template.validate()?;

    info!(
        stack = %stack.name(),
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        "Synthesized template"
    );
    Ok(template)
}

pub fn render(template: &Template, format: OutputFormat) -> Result<String, StackError> {
    match format {
        OutputFormat::Json => template.to_json_pretty(),
        OutputFormat::Yaml => serde_yaml::to_string(template)
            .map_err(|e| StackError::new(ErrorCode::Serialization, e.to_string())),
    }
}
