//! Stack: the unit that owns a template and hands out logical ids

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::environment::StackEnvironment;
use crate::error::{ErrorCode, StackError};
use crate::intrinsic::Pseudo;
use crate::logical_id::make_unique_id;
use crate::template::{Output, Resource, Template};

static STACK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("static regex"));

/// A stack under construction.
///
/// Constructs register resources by construct path; the stack derives the
/// logical id and refuses duplicates.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: StackEnvironment,
    template: Template,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Result<Self, StackError> {
        let name = name.into();
        if !STACK_NAME.is_match(&name) {
            return Err(StackError::new(
                ErrorCode::InvalidId,
                format!(
                    "Stack name '{}' must start with a letter and contain only alphanumerics and hyphens (max 128)",
                    name
                ),
            ));
        }

        Ok(Self {
            name,
            env: StackEnvironment::agnostic(),
            template: Template::new(),
        })
    }

    pub fn with_environment(mut self, env: StackEnvironment) -> Self {
        self.env = env;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.template.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &StackEnvironment {
        &self.env
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }

    pub fn account(&self) -> Value {
        self.env.account_value()
    }

    pub fn region(&self) -> Value {
        self.env.region_value()
    }

    pub fn partition(&self) -> Value {
        Pseudo::Partition.to_value()
    }

    pub fn url_suffix(&self) -> Value {
        Pseudo::UrlSuffix.to_value()
    }

    /// Register a resource under a construct path and return its logical id
    pub fn add_resource(
        &mut self,
        path: &[&str],
        resource: Resource,
    ) -> Result<String, StackError> {
        validate_path(path)?;
        let logical_id = make_unique_id(path)?;

        if self.template.resources.contains_key(&logical_id) {
            return Err(StackError::new(
                ErrorCode::DuplicateLogicalId,
                format!("There is already a resource with logical id {}", logical_id),
            )
            .with_resource(logical_id));
        }

        debug!(
            logical_id = %logical_id,
            resource_type = %resource.resource_type,
            path = %path.join("/"),
            "Declaring resource"
        );
        self.template.resources.insert(logical_id.clone(), resource);
        Ok(logical_id)
    }

    /// Register a stack output under a top-level id
    pub fn add_output(&mut self, id: &str, output: Output) -> Result<String, StackError> {
        validate_path(&[id])?;
        let logical_id = make_unique_id(&[id])?;

        if self.template.outputs.contains_key(&logical_id) {
            return Err(StackError::new(
                ErrorCode::DuplicateLogicalId,
                format!("There is already an output with logical id {}", logical_id),
            )
            .with_resource(logical_id));
        }

        debug!(output = %logical_id, "Declaring output");
        self.template.outputs.insert(logical_id.clone(), output);
        Ok(logical_id)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.template.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Result<&mut Resource, StackError> {
        self.template
            .resources
            .get_mut(logical_id)
            .ok_or_else(|| StackError::not_found(logical_id))
    }
}

fn validate_path(path: &[&str]) -> Result<(), StackError> {
    for component in path {
        if component.is_empty() {
            return Err(StackError::new(
                ErrorCode::InvalidId,
                format!("Construct path '{}' contains an empty id", path.join("/")),
            ));
        }
        if component.contains('/') {
            return Err(StackError::new(
                ErrorCode::InvalidId,
                format!("Construct id '{}' must not contain '/'", component),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resource_derives_logical_id() {
        let mut stack = Stack::new("TestStack").unwrap();
        let id = stack
            .add_resource(&["MyQueue", "Resource"], Resource::new("AWS::SQS::Queue"))
            .unwrap();

        assert_eq!(id, "MyQueueE6CA6235");
        assert!(stack.resource(&id).is_some());
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut stack = Stack::new("TestStack").unwrap();
        stack
            .add_resource(&["MyQueue", "Resource"], Resource::new("AWS::SQS::Queue"))
            .unwrap();

        let err = stack
            .add_resource(&["MyQueue", "Resource"], Resource::new("AWS::SQS::Queue"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateLogicalId);
        assert_eq!(err.resource.as_deref(), Some("MyQueueE6CA6235"));
    }

    #[test]
    fn test_invalid_construct_ids() {
        let mut stack = Stack::new("TestStack").unwrap();

        let err = stack
            .add_resource(&["", "Resource"], Resource::new("AWS::SQS::Queue"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidId);

        let err = stack
            .add_resource(&["a/b"], Resource::new("AWS::SQS::Queue"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidId);
    }

    #[test]
    fn test_invalid_stack_name() {
        assert!(Stack::new("1stack").is_err());
        assert!(Stack::new("my_stack").is_err());
        assert!(Stack::new("My-Stack").is_ok());
    }

    #[test]
    fn test_outputs() {
        let mut stack = Stack::new("TestStack").unwrap();
        let id = stack
            .add_output("ApiUrl", Output::new(Value::String("x".into())))
            .unwrap();
        assert_eq!(id, "ApiUrl");

        let err = stack
            .add_output("ApiUrl", Output::new(Value::Null))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateLogicalId);
    }

    #[test]
    fn test_resource_mut_missing() {
        let mut stack = Stack::new("TestStack").unwrap();
        let err = stack.resource_mut("Nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
