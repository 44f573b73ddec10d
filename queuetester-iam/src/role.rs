//! Execution roles and grants

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use queuetester_core::{get_att, ref_, Resource, Stack, StackError};

use crate::policy::{PolicyDocument, PolicyStatement, Principal};

/// Role configuration
#[derive(Debug, Clone)]
pub struct RoleProps {
    pub assumed_by: Principal,
    pub managed_policy_arns: Vec<Value>,
    pub description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties<'a> {
    assume_role_policy_document: &'a PolicyDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    managed_policy_arns: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyProperties<'a> {
    policy_document: &'a PolicyDocument,
    policy_name: &'a str,
    roles: Vec<Value>,
}

/// An `AWS::IAM::Role` plus its lazily declared `DefaultPolicy`
#[derive(Debug, Clone)]
pub struct Role {
    logical_id: String,
    scope: Vec<String>,
    default_policy: Option<String>,
    document: PolicyDocument,
}

impl Role {
    /// Declare a role at `scope` (the role's own construct path)
    pub fn new(stack: &mut Stack, scope: &[&str], props: RoleProps) -> Result<Self, StackError> {
        let trust: PolicyDocument = std::iter::once(
            PolicyStatement::allow()
                .with_actions(["sts:AssumeRole"])
                .with_principal(props.assumed_by),
        )
        .collect();

        let resource = Resource::new("AWS::IAM::Role").with_properties(&RoleProperties {
            assume_role_policy_document: &trust,
            description: props.description.as_deref(),
            managed_policy_arns: props.managed_policy_arns,
        })?;

        let mut path = scope.to_vec();
        path.push("Resource");
        let logical_id = stack.add_resource(&path, resource)?;

        Ok(Self {
            logical_id,
            scope: scope.iter().map(|s| s.to_string()).collect(),
            default_policy: None,
            document: PolicyDocument::new(),
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn default_policy_id(&self) -> Option<&str> {
        self.default_policy.as_deref()
    }

    pub fn policy_document(&self) -> &PolicyDocument {
        &self.document
    }

    /// Add a statement to the role's inline default policy, declaring the
    /// policy on first use.
    pub fn add_to_principal_policy(
        &mut self,
        stack: &mut Stack,
        statement: PolicyStatement,
    ) -> Result<(), StackError> {
        if !self.document.add_statement(statement) && self.default_policy.is_some() {
            return Ok(());
        }

        let policy_id = if let Some(id) = self.default_policy.clone() {
            id
        } else {
            let mut path: Vec<&str> = self.scope.iter().map(String::as_str).collect();
            path.extend(["DefaultPolicy", "Resource"]);
            let id = stack.add_resource(&path, Resource::new("AWS::IAM::Policy"))?;
            self.default_policy = Some(id.clone());
            id
        };

        stack
            .resource_mut(&policy_id)?
            .set_properties(&PolicyProperties {
                policy_document: &self.document,
                policy_name: &policy_id,
                roles: vec![ref_(&self.logical_id)],
            })?;

        Ok(())
    }
}

/// Something that can be granted permissions through an execution role
pub trait Grantable {
    fn role(&self) -> &Role;

    fn role_mut(&mut self) -> &mut Role;

    /// Logical ids that must be created after the role's default policy
    fn policy_dependents(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Grantable for Role {
    fn role(&self) -> &Role {
        self
    }

    fn role_mut(&mut self) -> &mut Role {
        self
    }
}

/// Allow `grantee` to perform `actions` on `resources`
pub fn grant<G: Grantable + ?Sized>(
    stack: &mut Stack,
    grantee: &mut G,
    actions: &[&str],
    resources: Vec<Value>,
) -> Result<(), StackError> {
    let mut statement = PolicyStatement::allow().with_actions(actions.iter().copied());
    for resource in resources {
        statement = statement.with_resource(resource);
    }

    grantee.role_mut().add_to_principal_policy(stack, statement)?;

    if let Some(policy_id) = grantee.role().default_policy_id().map(str::to_string) {
        for dependent in grantee.policy_dependents() {
            stack.resource_mut(&dependent)?.add_dependency(policy_id.clone());
        }
    }

    debug!(
        role = %grantee.role().logical_id(),
        actions = ?actions,
        "Granted permissions"
    );
    Ok(())
}
