//! CloudFormation template model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{ErrorCode, StackError};
use crate::intrinsic::{collect_references, Reference};

/// What CloudFormation does with a resource when it is replaced or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// A single entry of the template's `Resources` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Use a serializable property struct as the resource's `Properties`
    pub fn with_properties<T: Serialize>(mut self, properties: &T) -> Result<Self, StackError> {
        self.set_properties(properties)?;
        Ok(self)
    }

    /// Replace the resource's `Properties` with a re-rendered property struct
    pub fn set_properties<T: Serialize>(&mut self, properties: &T) -> Result<(), StackError> {
        match serde_json::to_value(properties)? {
            Value::Object(map) => {
                self.properties = map;
                Ok(())
            }
            other => Err(StackError::new(
                ErrorCode::Serialization,
                format!(
                    "Properties of {} must serialize to an object, got {}",
                    self.resource_type, other
                ),
            )),
        }
    }

    /// Apply the same policy on replacement and deletion
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    /// Add a `DependsOn` edge, keeping the list sorted and unique
    pub fn add_dependency(&mut self, logical_id: impl Into<String>) {
        let logical_id = logical_id.into();
        if let Err(pos) = self.depends_on.binary_search(&logical_id) {
            self.depends_on.insert(pos, logical_id);
        }
    }
}

/// A single entry of the template's `Outputs` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Value>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
            export: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A complete CloudFormation template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every resource with the given type, keyed by logical id
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Check that every reference in the template resolves to a declared resource
    pub fn validate(&self) -> Result<(), StackError> {
        for (logical_id, resource) in &self.resources {
            for dependency in &resource.depends_on {
                if !self.resources.contains_key(dependency) {
                    return Err(unresolved(logical_id, dependency));
                }
            }
            let properties = Value::Object(resource.properties.clone());
            self.check_references(logical_id, &properties)?;
        }

        for (output_id, output) in &self.outputs {
            self.check_references(output_id, &output.value)?;
        }

        Ok(())
    }

    fn check_references(&self, owner: &str, value: &Value) -> Result<(), StackError> {
        for reference in collect_references(value) {
            let target = reference.logical_id();
            if !self.resources.contains_key(target) {
                return Err(unresolved(owner, target));
            }
            if let Reference::GetAtt { attribute, .. } = &reference {
                if attribute.is_empty() {
                    return Err(StackError::invalid_property(
                        owner,
                        format!("Fn::GetAtt on {} has an empty attribute", target),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn unresolved(owner: &str, target: &str) -> StackError {
    StackError::new(
        ErrorCode::UnresolvedReference,
        format!("{} references {} which is not declared", owner, target),
    )
    .with_resource(owner)
}
