//! Customer managed KMS key

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use queuetester_core::{get_att, join, ref_, RemovalPolicy, Resource, Stack, StackError};
use queuetester_iam::{grant, Grantable, PolicyDocument, PolicyStatement, Principal};

use crate::alias::normalize_alias_name;

/// Key configuration
#[derive(Debug, Clone)]
pub struct KeyProps {
    pub alias: Option<String>,
    pub description: Option<String>,
    pub enable_key_rotation: bool,
    pub removal_policy: RemovalPolicy,
}

impl Default for KeyProps {
    fn default() -> Self {
        Self {
            alias: None,
            description: None,
            enable_key_rotation: false,
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    enable_key_rotation: bool,
    key_policy: &'a PolicyDocument,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AliasProperties<'a> {
    alias_name: &'a str,
    target_key_id: Value,
}

/// An `AWS::KMS::Key` and its optional `AWS::KMS::Alias`
#[derive(Debug, Clone)]
pub struct Key {
    logical_id: String,
    alias: Option<(String, String)>,
}

impl Key {
    pub fn new(stack: &mut Stack, id: &str, props: KeyProps) -> Result<Self, StackError> {
        // Normalize first so a bad alias does not leave a half-declared key behind
        let alias_name = props.alias.as_deref().map(normalize_alias_name).transpose()?;

        let root = join(
            "",
            vec![
                json!("arn:"),
                stack.partition(),
                json!(":iam::"),
                stack.account(),
                json!(":root"),
            ],
        );
        let key_policy: PolicyDocument = std::iter::once(
            PolicyStatement::allow()
                .with_actions(["kms:*"])
                .with_principal(Principal::Aws(root))
                .with_resource(json!("*")),
        )
        .collect();

        let resource = Resource::new("AWS::KMS::Key")
            .with_properties(&KeyProperties {
                description: props.description.as_deref(),
                enable_key_rotation: props.enable_key_rotation,
                key_policy: &key_policy,
            })?
            .with_removal_policy(props.removal_policy);
        let logical_id = stack.add_resource(&[id, "Resource"], resource)?;

        let alias = match alias_name {
            Some(name) => {
                let alias_resource =
                    Resource::new("AWS::KMS::Alias").with_properties(&AliasProperties {
                        alias_name: &name,
                        target_key_id: get_att(&logical_id, "Arn"),
                    })?;
                let alias_id = stack.add_resource(&[id, "Alias", "Resource"], alias_resource)?;
                Some((alias_id, name))
            }
            None => None,
        };

        debug!(key = %logical_id, alias = ?alias.as_ref().map(|(_, n)| n), "Declared key");
        Ok(Self { logical_id, alias })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn key_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn key_id(&self) -> Value {
        ref_(&self.logical_id)
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_ref().map(|(_, name)| name.as_str())
    }

    pub fn alias_logical_id(&self) -> Option<&str> {
        self.alias.as_ref().map(|(id, _)| id.as_str())
    }

    /// Grant arbitrary key actions on this key
    pub fn grant<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
        actions: &[&str],
    ) -> Result<(), StackError> {
        grant(stack, grantee, actions, vec![self.key_arn()])
    }

    pub fn grant_decrypt<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
    ) -> Result<(), StackError> {
        self.grant(stack, grantee, &["kms:Decrypt"])
    }

    pub fn grant_encrypt_decrypt<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
    ) -> Result<(), StackError> {
        self.grant(
            stack,
            grantee,
            &["kms:Decrypt", "kms:Encrypt", "kms:ReEncrypt*", "kms:GenerateDataKey*"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuetester_core::{ErrorCode, StackEnvironment};
    use queuetester_iam::{Role, RoleProps};

    fn props_with_alias(alias: &str) -> KeyProps {
        KeyProps {
            alias: Some(alias.to_string()),
            ..KeyProps::default()
        }
    }

    #[test]
    fn test_key_and_alias_declared() {
        let mut stack = Stack::new("TestStack").unwrap();
        let key = Key::new(&mut stack, "QueueKey", props_with_alias("alias/QueueKey")).unwrap();

        let resource = stack.resource(key.logical_id()).unwrap();
        assert_eq!(resource.resource_type, "AWS::KMS::Key");
        assert_eq!(resource.deletion_policy, Some(RemovalPolicy::Retain));
        assert_eq!(
            resource.properties["KeyPolicy"]["Statement"][0]["Principal"],
            json!({"AWS": {"Fn::Join": ["", [
                "arn:",
                {"Ref": "AWS::Partition"},
                ":iam::",
                {"Ref": "AWS::AccountId"},
                ":root"
            ]]}})
        );
        assert!(resource.properties.get("EnableKeyRotation").is_none());

        let alias = stack.resource(key.alias_logical_id().unwrap()).unwrap();
        assert_eq!(alias.properties["AliasName"], "alias/QueueKey");
        assert_eq!(alias.properties["TargetKeyId"], key.key_arn());
        assert_eq!(key.alias_name(), Some("alias/QueueKey"));
    }

    #[test]
    fn test_concrete_account_in_key_policy() {
        let mut stack = Stack::new("TestStack")
            .unwrap()
            .with_environment(StackEnvironment::new("123456789012", "us-east-1"));
        let key = Key::new(&mut stack, "QueueKey", KeyProps::default()).unwrap();

        let resource = stack.resource(key.logical_id()).unwrap();
        let principal = &resource.properties["KeyPolicy"]["Statement"][0]["Principal"];
        let parts = &principal["AWS"]["Fn::Join"][1];
        assert_eq!(parts[3], "123456789012");
        assert!(key.alias_logical_id().is_none());
    }

    #[test]
    fn test_invalid_alias_declares_nothing() {
        let mut stack = Stack::new("TestStack").unwrap();
        let err = Key::new(&mut stack, "QueueKey", props_with_alias("alias/aws/sqs")).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidProperty);
        assert!(stack.template().resources.is_empty());
    }

    #[test]
    fn test_grant_encrypt_decrypt() {
        let mut stack = Stack::new("TestStack").unwrap();
        let key = Key::new(&mut stack, "QueueKey", KeyProps::default()).unwrap();
        let mut role = Role::new(
            &mut stack,
            &["Writer", "ServiceRole"],
            RoleProps {
                assumed_by: Principal::service("lambda.amazonaws.com"),
                managed_policy_arns: vec![],
                description: None,
            },
        )
        .unwrap();

        key.grant_encrypt_decrypt(&mut stack, &mut role).unwrap();

        let statement = &role.policy_document().statements()[0];
        assert_eq!(
            statement.actions,
            vec!["kms:Decrypt", "kms:Encrypt", "kms:ReEncrypt*", "kms:GenerateDataKey*"]
        );
        assert_eq!(statement.resources, vec![key.key_arn()]);
    }
}
