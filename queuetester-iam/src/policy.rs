//! IAM policy documents

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a statement applies to
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// An AWS service, e.g. `lambda.amazonaws.com`
    Service(String),
    /// An account or role ARN (may be an intrinsic)
    Aws(Value),
    /// Every AWS principal (`{"AWS": "*"}`)
    AnyPrincipal,
}

impl Principal {
    pub fn service(name: impl Into<String>) -> Self {
        Self::Service(name.into())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Service(service) => json!({ "Service": service }),
            Self::Aws(arn) => json!({ "AWS": arn }),
            Self::AnyPrincipal => json!({ "AWS": "*" }),
        }
    }
}

/// A single policy statement.
///
/// Renders single-element action and resource lists as scalars, the way
/// CloudFormation templates conventionally spell them.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub principal: Option<Principal>,
    pub conditions: Map<String, Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self::new(Effect::Allow)
    }

    pub fn deny() -> Self {
        Self::new(Effect::Deny)
    }

    fn new(effect: Effect) -> Self {
        Self {
            effect,
            actions: Vec::new(),
            resources: Vec::new(),
            principal: None,
            conditions: Map::new(),
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Add `{operator: {key: value}}` to the statement's conditions
    pub fn with_condition(mut self, operator: &str, key: &str, value: Value) -> Self {
        let entry = self
            .conditions
            .entry(operator.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(keys) = entry {
            keys.insert(key.to_string(), value);
        }
        self
    }
}

fn one_or_many<T: Serialize>(items: &[T]) -> Value {
    match items {
        [single] => json!(single),
        many => json!(many),
    }
}

impl Serialize for PolicyStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("Action", &one_or_many(&self.actions))?;
        if !self.conditions.is_empty() {
            map.serialize_entry("Condition", &self.conditions)?;
        }
        map.serialize_entry("Effect", &self.effect)?;
        if let Some(principal) = &self.principal {
            map.serialize_entry("Principal", &principal.to_json())?;
        }
        if !self.resources.is_empty() {
            map.serialize_entry("Resource", &one_or_many(&self.resources))?;
        }
        map.end()
    }
}

/// An ordered, de-duplicated list of statements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Statement")]
    statements: Vec<PolicyStatement>,
    #[serde(rename = "Version")]
    version: &'static str,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            version: POLICY_VERSION,
        }
    }

    /// Append a statement unless an identical one is already present.
    ///
    /// Returns whether the document changed.
    pub fn add_statement(&mut self, statement: PolicyStatement) -> bool {
        if self.statements.contains(&statement) {
            return false;
        }
        self.statements.push(statement);
        true
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<PolicyStatement> for PolicyDocument {
    fn from_iter<I: IntoIterator<Item = PolicyStatement>>(iter: I) -> Self {
        let mut document = Self::new();
        for statement in iter {
            document.add_statement(statement);
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuetester_core::get_att;

    #[test]
    fn test_single_action_renders_as_string() {
        let statement = PolicyStatement::allow()
            .with_actions(["sqs:SendMessage"])
            .with_resource(get_att("Queue", "Arn"));

        assert_eq!(
            serde_json::to_value(&statement).unwrap(),
            json!({
                "Action": "sqs:SendMessage",
                "Effect": "Allow",
                "Resource": {"Fn::GetAtt": ["Queue", "Arn"]}
            })
        );
    }

    #[test]
    fn test_deny_with_condition_and_principal() {
        let statement = PolicyStatement::deny()
            .with_actions(["sqs:*"])
            .with_principal(Principal::AnyPrincipal)
            .with_condition("Bool", "aws:SecureTransport", json!("false"))
            .with_resource(get_att("Queue", "Arn"));

        assert_eq!(
            serde_json::to_value(&statement).unwrap(),
            json!({
                "Action": "sqs:*",
                "Condition": {"Bool": {"aws:SecureTransport": "false"}},
                "Effect": "Deny",
                "Principal": {"AWS": "*"},
                "Resource": {"Fn::GetAtt": ["Queue", "Arn"]}
            })
        );
    }

    #[test]
    fn test_multiple_actions_render_as_array() {
        let statement = PolicyStatement::allow().with_actions(["kms:Decrypt", "kms:Encrypt"]);
        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["Action"], json!(["kms:Decrypt", "kms:Encrypt"]));
        assert!(json.get("Resource").is_none());
    }

    #[test]
    fn test_document_deduplicates_statements() {
        let statement = PolicyStatement::allow()
            .with_actions(["sqs:ReceiveMessage"])
            .with_resource(json!("*"));

        let mut document = PolicyDocument::new();
        assert!(document.add_statement(statement.clone()));
        assert!(!document.add_statement(statement));
        assert_eq!(document.statements().len(), 1);

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["Version"], "2012-10-17");
        assert_eq!(json["Statement"].as_array().unwrap().len(), 1);
    }
}
