//! Assertions over a synthesized template

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use queuetester_core::Stack;

use crate::matcher::Match;

/// Why a template assertion failed
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error("Template has {found} resource(s) with type {resource_type}, but none match as expected.\nClosest mismatch ({logical_id}): {reason}")]
    NoMatchingResource {
        resource_type: String,
        found: usize,
        logical_id: String,
        reason: String,
    },

    #[error("Template has no resource with type {0}")]
    NoResourceOfType(String),

    #[error("Expected {expected} resource(s) of type {resource_type} but found {found}")]
    CountMismatch {
        resource_type: String,
        expected: usize,
        found: usize,
    },

    #[error("Template has no output matching {id}: {reason}")]
    NoMatchingOutput { id: String, reason: String },

    #[error("Template could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A template under test, held as plain JSON
#[derive(Debug, Clone)]
pub struct Template {
    json: Value,
}

impl Template {
    /// Capture the stack's template as it is now
    ///
    /// # Panics
    ///
    /// If the template cannot be serialized.
    pub fn from_stack(stack: &Stack) -> Self {
        match Self::from_template(stack.template()) {
            Ok(template) => template,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn from_template(template: &queuetester_core::Template) -> Result<Self, AssertionError> {
        Ok(Self::from_json(serde_json::to_value(template)?))
    }

    pub fn from_json(json: Value) -> Self {
        Self { json }
    }

    pub fn to_json(&self) -> &Value {
        &self.json
    }

    /// Resources of `resource_type` whose full definition (`Type`,
    /// `Properties`, `DependsOn`, ...) matches `pattern`
    pub fn find_resources(
        &self,
        resource_type: &str,
        pattern: impl Into<Match>,
    ) -> BTreeMap<String, Value> {
        let pattern = pattern.into();
        self.resources_of_type(resource_type)
            .filter(|(_, resource)| pattern.test(Some(resource)).is_ok())
            .map(|(id, resource)| (id.clone(), resource.clone()))
            .collect()
    }

    pub fn try_resource_count_is(
        &self,
        resource_type: &str,
        expected: usize,
    ) -> Result<(), AssertionError> {
        let found = self.resources_of_type(resource_type).count();
        if found == expected {
            Ok(())
        } else {
            Err(AssertionError::CountMismatch {
                resource_type: resource_type.to_string(),
                expected,
                found,
            })
        }
    }

    pub fn resource_count_is(&self, resource_type: &str, expected: usize) {
        if let Err(e) = self.try_resource_count_is(resource_type, expected) {
            panic!("{}", e);
        }
    }

    /// At least one resource of `resource_type` has a full definition matching `pattern`
    pub fn try_has_resource(
        &self,
        resource_type: &str,
        pattern: impl Into<Match>,
    ) -> Result<(), AssertionError> {
        let pattern = pattern.into();
        self.any_resource(resource_type, |resource| pattern.test(Some(resource)))
    }

    pub fn has_resource(&self, resource_type: &str, pattern: impl Into<Match>) {
        if let Err(e) = self.try_has_resource(resource_type, pattern) {
            panic!("{}", e);
        }
    }

    /// At least one resource of `resource_type` has `Properties` matching `pattern`
    pub fn try_has_resource_properties(
        &self,
        resource_type: &str,
        pattern: impl Into<Match>,
    ) -> Result<(), AssertionError> {
        let pattern = pattern.into();
        // A resource without properties is treated as having empty ones
        let empty = Value::Object(Map::new());
        self.any_resource(resource_type, |resource| {
            pattern.test_at("/Properties", Some(resource.get("Properties").unwrap_or(&empty)))
        })
    }

    pub fn has_resource_properties(&self, resource_type: &str, pattern: impl Into<Match>) {
        if let Err(e) = self.try_has_resource_properties(resource_type, pattern) {
            panic!("{}", e);
        }
    }

    /// Outputs whose id is `id` (or any id for `*`) and whose definition matches `pattern`
    pub fn find_outputs(&self, id: &str, pattern: impl Into<Match>) -> BTreeMap<String, Value> {
        let pattern = pattern.into();
        self.section("Outputs")
            .filter(|(output_id, _)| id == "*" || output_id.as_str() == id)
            .filter(|(_, output)| pattern.test(Some(output)).is_ok())
            .map(|(output_id, output)| (output_id.clone(), output.clone()))
            .collect()
    }

    pub fn try_has_output(
        &self,
        id: &str,
        pattern: impl Into<Match>,
    ) -> Result<(), AssertionError> {
        let pattern = pattern.into();
        let mut reason = format!("no output named {}", id);
        for (output_id, output) in self.section("Outputs") {
            if id != "*" && output_id.as_str() != id {
                continue;
            }
            match pattern.test(Some(output)) {
                Ok(()) => return Ok(()),
                Err(mismatch) => reason = mismatch,
            }
        }
        Err(AssertionError::NoMatchingOutput {
            id: id.to_string(),
            reason,
        })
    }

    pub fn has_output(&self, id: &str, pattern: impl Into<Match>) {
        if let Err(e) = self.try_has_output(id, pattern) {
            panic!("{}", e);
        }
    }

    fn section<'a>(&'a self, name: &str) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.json
            .get(name)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(Map::iter)
    }

    fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.section("Resources")
            .filter(move |(_, r)| r.get("Type").and_then(Value::as_str) == Some(resource_type))
    }

    fn any_resource<F>(&self, resource_type: &str, test: F) -> Result<(), AssertionError>
    where
        F: Fn(&Value) -> Result<(), String>,
    {
        let mut found = 0;
        let mut first_mismatch = None;
        for (logical_id, resource) in self.resources_of_type(resource_type) {
            found += 1;
            match test(resource) {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    first_mismatch.get_or_insert((logical_id.clone(), reason));
                }
            }
        }

        match first_mismatch {
            Some((logical_id, reason)) => Err(AssertionError::NoMatchingResource {
                resource_type: resource_type.to_string(),
                found,
                logical_id,
                reason,
            }),
            None => Err(AssertionError::NoResourceOfType(resource_type.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Template {
        Template::from_json(json!({
            "Resources": {
                "Queue": {
                    "Type": "AWS::SQS::Queue",
                    "Properties": {"FifoQueue": true},
                    "DeletionPolicy": "Delete"
                },
                "Dlq": {
                    "Type": "AWS::SQS::Queue",
                    "Properties": {"FifoQueue": true, "MessageRetentionPeriod": 1_209_600}
                },
                "Bare": {"Type": "AWS::SNS::Topic"}
            },
            "Outputs": {
                "ApiUrl": {"Value": "https://example"}
            }
        }))
    }

    #[test]
    fn test_has_resource_properties() {
        let template = template();
        template.has_resource_properties("AWS::SQS::Queue", json!({"FifoQueue": true}));
        template.has_resource_properties(
            "AWS::SQS::Queue",
            Match::object_like([("MessageRetentionPeriod", Match::any_value())]),
        );
        template.has_resource_properties(
            "AWS::SNS::Topic",
            Match::object_like([("TopicName", Match::absent())]),
        );
    }

    #[test]
    fn test_no_matching_resource_error() {
        let err = template()
            .try_has_resource_properties("AWS::SQS::Queue", json!({"FifoQueue": false}))
            .unwrap_err();
        match err {
            AssertionError::NoMatchingResource { found, reason, .. } => {
                assert_eq!(found, 2);
                assert!(reason.starts_with("/Properties/FifoQueue"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = template()
            .try_has_resource_properties("AWS::Lambda::Function", json!({}))
            .unwrap_err();
        assert!(matches!(err, AssertionError::NoResourceOfType(_)));
    }

    #[test]
    fn test_has_resource_matches_whole_definition() {
        let template = template();
        template.has_resource("AWS::SQS::Queue", json!({"DeletionPolicy": "Delete"}));
        assert!(template
            .try_has_resource("AWS::SQS::Queue", json!({"DeletionPolicy": "Retain"}))
            .is_err());
    }

    #[test]
    fn test_find_resources_and_count() {
        let template = template();
        assert_eq!(template.find_resources("AWS::SQS::Queue", json!({})).len(), 2);
        let with_retention = template.find_resources(
            "AWS::SQS::Queue",
            json!({"Properties": {"MessageRetentionPeriod": 1_209_600}}),
        );
        assert_eq!(with_retention.keys().collect::<Vec<_>>(), vec!["Dlq"]);

        template.resource_count_is("AWS::SQS::Queue", 2);
        template.resource_count_is("AWS::Lambda::Function", 0);
        assert!(template.try_resource_count_is("AWS::SQS::Queue", 1).is_err());
    }

    #[test]
    fn test_outputs() {
        let template = template();
        template.has_output("ApiUrl", Match::object_like([("Value", Match::any_value())]));
        template.has_output("*", json!({"Value": "https://example"}));
        assert!(template.try_has_output("Missing", json!({})).is_err());
        assert_eq!(template.find_outputs("*", json!({})).len(), 1);
    }
}
