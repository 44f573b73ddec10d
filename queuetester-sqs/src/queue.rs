//! Queue construct

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use queuetester_core::{get_att, ref_, RemovalPolicy, Resource, Stack, StackError};
use queuetester_iam::{grant, Grantable, PolicyDocument, PolicyStatement, Principal};
use queuetester_kms::Key;

const FIFO_SUFFIX: &str = ".fifo";

const SEND_ACTIONS: &[&str] = &["sqs:SendMessage", "sqs:GetQueueAttributes", "sqs:GetQueueUrl"];

const CONSUME_ACTIONS: &[&str] = &[
    "sqs:ReceiveMessage",
    "sqs:ChangeMessageVisibility",
    "sqs:GetQueueUrl",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
];

/// Where messages go after `max_receive_count` failed receives
#[derive(Debug, Clone, Copy)]
pub struct DeadLetterQueue<'a> {
    pub queue: &'a Queue,
    pub max_receive_count: u32,
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueProps<'a> {
    pub queue_name: Option<String>,
    pub fifo: bool,
    pub content_based_deduplication: bool,
    /// Deny every request that is not made over TLS
    pub enforce_ssl: bool,
    /// Encrypt at rest with this key
    pub encryption_master_key: Option<&'a Key>,
    pub dead_letter_queue: Option<DeadLetterQueue<'a>>,
    pub visibility_timeout_secs: Option<u32>,
    pub removal_policy: RemovalPolicy,
}

impl Default for QueueProps<'_> {
    fn default() -> Self {
        Self {
            queue_name: None,
            fifo: false,
            content_based_deduplication: false,
            enforce_ssl: false,
            encryption_master_key: None,
            dead_letter_queue: None,
            visibility_timeout_secs: None,
            removal_policy: RemovalPolicy::Delete,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RedrivePolicy {
    dead_letter_target_arn: Value,
    max_receive_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueueProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content_based_deduplication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fifo_queue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kms_master_key_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redrive_policy: Option<RedrivePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility_timeout: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueuePolicyProperties<'a> {
    policy_document: &'a PolicyDocument,
    queues: Vec<Value>,
}

/// An `AWS::SQS::Queue`, plus its `AWS::SQS::QueuePolicy` when TLS is enforced
#[derive(Debug, Clone)]
pub struct Queue {
    logical_id: String,
    policy_id: Option<String>,
    fifo: bool,
    encryption_master_key: Option<Key>,
}

impl Queue {
    pub fn new(stack: &mut Stack, id: &str, props: QueueProps<'_>) -> Result<Self, StackError> {
        validate_fifo(id, &props)?;

        if let Some(dlq) = &props.dead_letter_queue {
            if dlq.queue.is_fifo() != props.fifo {
                return Err(StackError::invalid_property(
                    id,
                    "Dead-letter queue must match the source queue's FIFO setting",
                ));
            }
            if dlq.max_receive_count == 0 {
                return Err(StackError::invalid_property(
                    id,
                    "Dead-letter maxReceiveCount must be at least 1",
                ));
            }
        }

        let resource = Resource::new("AWS::SQS::Queue")
            .with_properties(&QueueProperties {
                content_based_deduplication: props.content_based_deduplication.then_some(true),
                fifo_queue: props.fifo.then_some(true),
                kms_master_key_id: props.encryption_master_key.map(Key::key_arn),
                queue_name: props.queue_name.as_deref(),
                redrive_policy: props.dead_letter_queue.map(|dlq| RedrivePolicy {
                    dead_letter_target_arn: dlq.queue.queue_arn(),
                    max_receive_count: dlq.max_receive_count,
                }),
                visibility_timeout: props.visibility_timeout_secs,
            })?
            .with_removal_policy(props.removal_policy);
        let logical_id = stack.add_resource(&[id, "Resource"], resource)?;

        let mut queue = Self {
            logical_id,
            policy_id: None,
            fifo: props.fifo,
            encryption_master_key: props.encryption_master_key.cloned(),
        };

        if props.enforce_ssl {
            queue.policy_id = Some(queue.declare_ssl_policy(stack, id)?);
        }

        debug!(
            queue = %queue.logical_id,
            fifo = queue.fifo,
            encrypted = queue.encryption_master_key.is_some(),
            enforce_ssl = props.enforce_ssl,
            "Declared queue"
        );
        Ok(queue)
    }

    fn declare_ssl_policy(&self, stack: &mut Stack, id: &str) -> Result<String, StackError> {
        let document: PolicyDocument = std::iter::once(
            PolicyStatement::deny()
                .with_actions(["sqs:*"])
                .with_principal(Principal::AnyPrincipal)
                .with_condition("Bool", "aws:SecureTransport", json!("false"))
                .with_resource(self.queue_arn()),
        )
        .collect();

        let resource = Resource::new("AWS::SQS::QueuePolicy").with_properties(
            &QueuePolicyProperties {
                policy_document: &document,
                queues: vec![self.queue_url()],
            },
        )?;
        stack.add_resource(&[id, "Policy", "Resource"], resource)
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn policy_logical_id(&self) -> Option<&str> {
        self.policy_id.as_deref()
    }

    pub fn is_fifo(&self) -> bool {
        self.fifo
    }

    pub fn encryption_master_key(&self) -> Option<&Key> {
        self.encryption_master_key.as_ref()
    }

    /// `Ref` of a queue resolves to its URL
    pub fn queue_url(&self) -> Value {
        ref_(&self.logical_id)
    }

    pub fn queue_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    pub fn queue_name(&self) -> Value {
        get_att(&self.logical_id, "QueueName")
    }

    /// Grant arbitrary queue actions on this queue
    pub fn grant<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
        actions: &[&str],
    ) -> Result<(), StackError> {
        grant(stack, grantee, actions, vec![self.queue_arn()])
    }

    /// Allow sending, plus key encrypt/decrypt when the queue is key-encrypted
    pub fn grant_send_messages<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
    ) -> Result<(), StackError> {
        self.grant(stack, grantee, SEND_ACTIONS)?;
        if let Some(key) = &self.encryption_master_key {
            key.grant_encrypt_decrypt(stack, grantee)?;
        }
        Ok(())
    }

    /// Allow receiving, deleting and inspecting, plus key decrypt when the
    /// queue is key-encrypted
    pub fn grant_consume_messages<G: Grantable + ?Sized>(
        &self,
        stack: &mut Stack,
        grantee: &mut G,
    ) -> Result<(), StackError> {
        self.grant(stack, grantee, CONSUME_ACTIONS)?;
        if let Some(key) = &self.encryption_master_key {
            key.grant_decrypt(stack, grantee)?;
        }
        Ok(())
    }
}

fn validate_fifo(id: &str, props: &QueueProps<'_>) -> Result<(), StackError> {
    if let Some(name) = &props.queue_name {
        if props.fifo && !name.ends_with(FIFO_SUFFIX) {
            return Err(StackError::invalid_property(
                id,
                format!("FIFO queue names must end in '{}': {}", FIFO_SUFFIX, name),
            ));
        }
        if !props.fifo && name.ends_with(FIFO_SUFFIX) {
            return Err(StackError::invalid_property(
                id,
                format!("Non-FIFO queue name may not end in '{}': {}", FIFO_SUFFIX, name),
            ));
        }
    }
    if props.content_based_deduplication && !props.fifo {
        return Err(StackError::invalid_property(
            id,
            "Content-based deduplication can only be defined for FIFO queues",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuetester_core::ErrorCode;
    use queuetester_iam::{Role, RoleProps};
    use queuetester_kms::KeyProps;

    fn role(stack: &mut Stack, id: &str) -> Role {
        Role::new(
            stack,
            &[id, "ServiceRole"],
            RoleProps {
                assumed_by: Principal::service("lambda.amazonaws.com"),
                managed_policy_arns: vec![],
                description: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_encrypted_fifo_queue() {
        let mut stack = Stack::new("TestStack").unwrap();
        let key = Key::new(&mut stack, "Key", KeyProps::default()).unwrap();
        let queue = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                fifo: true,
                enforce_ssl: true,
                encryption_master_key: Some(&key),
                ..QueueProps::default()
            },
        )
        .unwrap();

        let resource = stack.resource(queue.logical_id()).unwrap();
        assert_eq!(resource.properties["FifoQueue"], true);
        assert_eq!(resource.properties["KmsMasterKeyId"], key.key_arn());
        assert_eq!(resource.deletion_policy, Some(RemovalPolicy::Delete));
        assert!(resource.properties.get("RedrivePolicy").is_none());

        let policy = stack.resource(queue.policy_logical_id().unwrap()).unwrap();
        assert_eq!(policy.resource_type, "AWS::SQS::QueuePolicy");
        assert_eq!(policy.properties["Queues"], json!([{"Ref": queue.logical_id()}]));
        assert_eq!(
            policy.properties["PolicyDocument"]["Statement"][0]["Condition"],
            json!({"Bool": {"aws:SecureTransport": "false"}})
        );
        assert_eq!(
            policy.properties["PolicyDocument"]["Statement"][0]["Effect"],
            "Deny"
        );
    }

    #[test]
    fn test_plain_queue_has_no_policy() {
        let mut stack = Stack::new("TestStack").unwrap();
        let queue = Queue::new(&mut stack, "Queue", QueueProps::default()).unwrap();

        assert!(queue.policy_logical_id().is_none());
        let resource = stack.resource(queue.logical_id()).unwrap();
        assert!(resource.properties.get("FifoQueue").is_none());
        assert!(resource.properties.get("KmsMasterKeyId").is_none());
    }

    #[test]
    fn test_fifo_name_rules() {
        let mut stack = Stack::new("TestStack").unwrap();

        let err = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                fifo: true,
                queue_name: Some("orders".to_string()),
                ..QueueProps::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProperty);

        let err = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                queue_name: Some("orders.fifo".to_string()),
                ..QueueProps::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProperty);

        let err = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                content_based_deduplication: true,
                ..QueueProps::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProperty);

        assert!(stack.template().resources.is_empty());
    }

    #[test]
    fn test_dead_letter_redrive() {
        let mut stack = Stack::new("TestStack").unwrap();
        let dlq = Queue::new(
            &mut stack,
            "DeadLetterQueue",
            QueueProps {
                fifo: true,
                ..QueueProps::default()
            },
        )
        .unwrap();
        let queue = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                fifo: true,
                dead_letter_queue: Some(DeadLetterQueue {
                    queue: &dlq,
                    max_receive_count: 3,
                }),
                ..QueueProps::default()
            },
        )
        .unwrap();

        let resource = stack.resource(queue.logical_id()).unwrap();
        assert_eq!(
            resource.properties["RedrivePolicy"],
            json!({
                "deadLetterTargetArn": {"Fn::GetAtt": [dlq.logical_id(), "Arn"]},
                "maxReceiveCount": 3
            })
        );
    }

    #[test]
    fn test_dead_letter_must_match_fifo() {
        let mut stack = Stack::new("TestStack").unwrap();
        let dlq = Queue::new(&mut stack, "DeadLetterQueue", QueueProps::default()).unwrap();

        let err = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                fifo: true,
                dead_letter_queue: Some(DeadLetterQueue {
                    queue: &dlq,
                    max_receive_count: 3,
                }),
                ..QueueProps::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProperty);
    }

    #[test]
    fn test_grants_on_encrypted_queue() {
        let mut stack = Stack::new("TestStack").unwrap();
        let key = Key::new(&mut stack, "Key", KeyProps::default()).unwrap();
        let queue = Queue::new(
            &mut stack,
            "Queue",
            QueueProps {
                fifo: true,
                encryption_master_key: Some(&key),
                ..QueueProps::default()
            },
        )
        .unwrap();

        let mut writer = role(&mut stack, "Writer");
        let mut reader = role(&mut stack, "Reader");
        queue.grant_send_messages(&mut stack, &mut writer).unwrap();
        queue.grant_consume_messages(&mut stack, &mut reader).unwrap();

        let writer_statements = writer.policy_document().statements();
        assert_eq!(writer_statements.len(), 2);
        assert_eq!(writer_statements[0].actions, SEND_ACTIONS);
        assert_eq!(writer_statements[0].resources, vec![queue.queue_arn()]);
        assert!(writer_statements[1]
            .actions
            .iter()
            .any(|a| a == "kms:GenerateDataKey*"));

        let reader_statements = reader.policy_document().statements();
        assert_eq!(reader_statements.len(), 2);
        assert_eq!(reader_statements[0].actions, CONSUME_ACTIONS);
        assert_eq!(reader_statements[1].actions, vec!["kms:Decrypt"]);
    }
}
