//! Lambda function construct

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use queuetester_core::{get_att, join, ref_, Resource, Stack, StackError};
use queuetester_iam::{Grantable, Principal, Role, RoleProps};

use crate::code::{Code, CodeProperties};
use crate::runtime::{LogFormat, Runtime};

static FUNCTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("static regex"));

static ENV_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("static regex"));

/// Variables set by the Lambda runtime itself
const RESERVED_ENV_KEYS: &[&str] = &[
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "AWS_EXECUTION_ENV",
    "AWS_LAMBDA_FUNCTION_NAME",
    "AWS_LAMBDA_RUNTIME_API",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "_HANDLER",
    "LAMBDA_TASK_ROOT",
];

const BASIC_EXECUTION_POLICY: &str = ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Function configuration
#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub function_name: Option<String>,
    pub runtime: Runtime,
    pub handler: String,
    pub code: Code,
    /// Values may be intrinsics, e.g. a queue URL
    pub environment: BTreeMap<String, Value>,
    pub logging_format: Option<LogFormat>,
    pub memory_size: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub description: Option<String>,
}

impl FunctionProps {
    /// A custom-runtime function whose handler is the `bootstrap` binary built
    /// from `entry`, the way Go functions are packaged
    pub fn go(entry: impl Into<String>) -> Self {
        Self {
            function_name: None,
            runtime: Runtime::ProvidedAl2,
            handler: "bootstrap".to_string(),
            code: Code::asset(entry),
            environment: BTreeMap::new(),
            logging_format: None,
            memory_size: None,
            timeout_secs: None,
            description: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvironmentProperties<'a> {
    variables: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoggingConfig {
    log_format: LogFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties<'a> {
    code: CodeProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<EnvironmentProperties<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_name: Option<&'a str>,
    handler: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    logging_config: Option<LoggingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_size: Option<u32>,
    role: Value,
    runtime: Runtime,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u32>,
}

/// Resource-based policy letting a service invoke the function
#[derive(Debug, Clone)]
pub struct Permission {
    pub principal: String,
    pub action: String,
    pub source_arn: Option<Value>,
}

impl Permission {
    pub fn invoke_from(principal: impl Into<String>, source_arn: Value) -> Self {
        Self {
            principal: principal.into(),
            action: "lambda:InvokeFunction".to_string(),
            source_arn: Some(source_arn),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PermissionProperties<'a> {
    action: &'a str,
    function_name: Value,
    principal: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_arn: Option<&'a Value>,
}

/// An `AWS::Lambda::Function` with its execution role
#[derive(Debug, Clone)]
pub struct Function {
    id: String,
    logical_id: String,
    function_name: Option<String>,
    role: Role,
}

impl Function {
    pub fn new(stack: &mut Stack, id: &str, props: FunctionProps) -> Result<Self, StackError> {
        validate(id, &props)?;

        let basic_execution = join(
            "",
            vec![json!("arn:"), stack.partition(), json!(BASIC_EXECUTION_POLICY)],
        );
        let role = Role::new(
            stack,
            &[id, "ServiceRole"],
            RoleProps {
                assumed_by: Principal::service("lambda.amazonaws.com"),
                managed_policy_arns: vec![basic_execution],
                description: None,
            },
        )?;

        let mut resource = Resource::new("AWS::Lambda::Function").with_properties(
            &FunctionProperties {
                code: props.code.to_properties(stack.env()),
                description: props.description.as_deref(),
                environment: (!props.environment.is_empty()).then_some(EnvironmentProperties {
                    variables: &props.environment,
                }),
                function_name: props.function_name.as_deref(),
                handler: &props.handler,
                logging_config: props
                    .logging_format
                    .map(|log_format| LoggingConfig { log_format }),
                memory_size: props.memory_size,
                role: role.arn(),
                runtime: props.runtime,
                timeout: props.timeout_secs,
            },
        )?;
        resource.add_dependency(role.logical_id());

        let logical_id = stack.add_resource(&[id, "Resource"], resource)?;

        debug!(
            function = %logical_id,
            function_name = ?props.function_name,
            runtime = props.runtime.as_str(),
            "Declared function"
        );
        Ok(Self {
            id: id.to_string(),
            logical_id,
            function_name: props.function_name,
            role,
        })
    }

    /// Construct id the function was declared with
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    pub fn function_arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    /// `Ref` of a function resolves to its name
    pub fn function_ref(&self) -> Value {
        ref_(&self.logical_id)
    }

    /// Declare an `AWS::Lambda::Permission` under `scope`
    pub fn add_permission(
        &self,
        stack: &mut Stack,
        scope: &[&str],
        permission: &Permission,
    ) -> Result<String, StackError> {
        let resource = Resource::new("AWS::Lambda::Permission").with_properties(
            &PermissionProperties {
                action: &permission.action,
                function_name: self.function_arn(),
                principal: &permission.principal,
                source_arn: permission.source_arn.as_ref(),
            },
        )?;
        stack.add_resource(scope, resource)
    }
}

impl Grantable for Function {
    fn role(&self) -> &Role {
        &self.role
    }

    fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    /// The function must not start before its role can do what it was granted
    fn policy_dependents(&self) -> Vec<String> {
        vec![self.logical_id.clone()]
    }
}

fn validate(id: &str, props: &FunctionProps) -> Result<(), StackError> {
    if let Some(name) = &props.function_name {
        if !FUNCTION_NAME.is_match(name) {
            return Err(StackError::invalid_property(
                id,
                format!(
                    "Function name '{}' must be 1-64 characters of letters, digits, '-' or '_'",
                    name
                ),
            ));
        }
    }

    for key in props.environment.keys() {
        if !ENV_KEY.is_match(key) {
            return Err(StackError::invalid_property(
                id,
                format!("Environment variable name '{}' is not valid", key),
            ));
        }
        if RESERVED_ENV_KEYS.contains(&key.as_str()) {
            return Err(StackError::invalid_property(
                id,
                format!("{} environment variable is reserved by the lambda runtime", key),
            ));
        }
    }

    if props.handler.is_empty() {
        return Err(StackError::invalid_property(
            id,
            "Custom runtimes need a handler name, usually 'bootstrap'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuetester_core::ErrorCode;
    use queuetester_iam::grant;

    fn reader_props() -> FunctionProps {
        FunctionProps {
            function_name: Some("handleReaderRequest".to_string()),
            logging_format: Some(LogFormat::Json),
            ..FunctionProps::go("../cmd/reader/main.go")
        }
    }

    #[test]
    fn test_function_properties() {
        let mut stack = Stack::new("TestStack").unwrap();
        let function = Function::new(&mut stack, "Reader", reader_props()).unwrap();

        let resource = stack.resource(function.logical_id()).unwrap();
        assert_eq!(resource.resource_type, "AWS::Lambda::Function");
        assert_eq!(resource.properties["FunctionName"], "handleReaderRequest");
        assert_eq!(resource.properties["Runtime"], "provided.al2");
        assert_eq!(resource.properties["Handler"], "bootstrap");
        assert_eq!(resource.properties["LoggingConfig"], json!({"LogFormat": "JSON"}));
        assert_eq!(resource.properties["Role"], function.role().arn());
        assert!(resource.properties.get("Environment").is_none());
        assert_eq!(resource.depends_on, vec![function.role().logical_id()]);
    }

    #[test]
    fn test_role_has_basic_execution_policy() {
        let mut stack = Stack::new("TestStack").unwrap();
        let function = Function::new(&mut stack, "Reader", reader_props()).unwrap();

        let role = stack.resource(function.role().logical_id()).unwrap();
        assert_eq!(
            role.properties["ManagedPolicyArns"],
            json!([{"Fn::Join": ["", [
                "arn:",
                {"Ref": "AWS::Partition"},
                ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
            ]]}])
        );
    }

    #[test]
    fn test_environment_variables() {
        let mut stack = Stack::new("TestStack").unwrap();
        let mut props = reader_props();
        props
            .environment
            .insert("QUEUE_URL".to_string(), json!({"Ref": "Queue"}));
        let function = Function::new(&mut stack, "Writer", props).unwrap();

        let resource = stack.resource(function.logical_id()).unwrap();
        assert_eq!(
            resource.properties["Environment"],
            json!({"Variables": {"QUEUE_URL": {"Ref": "Queue"}}})
        );
    }

    #[test]
    fn test_invalid_props_rejected() {
        let mut stack = Stack::new("TestStack").unwrap();

        let mut props = reader_props();
        props.function_name = Some("has space".to_string());
        let err = Function::new(&mut stack, "Reader", props).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidProperty);

        let mut props = reader_props();
        props
            .environment
            .insert("AWS_REGION".to_string(), json!("us-east-1"));
        let err = Function::new(&mut stack, "Reader", props).unwrap_err();
        assert!(err.message.contains("reserved"));

        let mut props = reader_props();
        props.handler.clear();
        let err = Function::new(&mut stack, "Reader", props).unwrap_err();
        assert!(err.message.contains("bootstrap"));

        assert!(stack.template().resources.is_empty());
    }

    #[test]
    fn test_grant_adds_policy_dependency() {
        let mut stack = Stack::new("TestStack").unwrap();
        let mut function = Function::new(&mut stack, "Reader", reader_props()).unwrap();

        grant(&mut stack, &mut function, &["sqs:ReceiveMessage"], vec![json!("*")]).unwrap();

        let policy_id = function.role().default_policy_id().unwrap().to_string();
        let resource = stack.resource(function.logical_id()).unwrap();
        assert!(resource.depends_on.contains(&policy_id));
        assert!(resource
            .depends_on
            .contains(&function.role().logical_id().to_string()));
    }

    #[test]
    fn test_add_permission() {
        let mut stack = Stack::new("TestStack").unwrap();
        let function = Function::new(&mut stack, "Writer", reader_props()).unwrap();

        let id = function
            .add_permission(
                &mut stack,
                &["Api", "Invoke-Permission"],
                &Permission::invoke_from("apigateway.amazonaws.com", json!("arn:source")),
            )
            .unwrap();

        let permission = stack.resource(&id).unwrap();
        assert_eq!(permission.properties["Action"], "lambda:InvokeFunction");
        assert_eq!(permission.properties["FunctionName"], function.function_arn());
        assert_eq!(permission.properties["SourceArn"], "arn:source");
    }
}
