//! HTTP API construct

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use queuetester_core::{join, ref_, Resource, Stack, StackError};
use queuetester_lambda::Permission;

use crate::route::{
    route_construct_id, route_key, validate_path, AddRoutesOptions, HttpLambdaIntegration,
    HttpRoute, IntegrationProperties, RouteProperties,
};

const DEFAULT_STAGE_NAME: &str = "$default";

/// API configuration
#[derive(Debug, Clone)]
pub struct HttpApiProps {
    /// Defaults to the construct id
    pub api_name: Option<String>,
    pub description: Option<String>,
    pub create_default_stage: bool,
}

impl Default for HttpApiProps {
    fn default() -> Self {
        Self {
            api_name: None,
            description: None,
            create_default_stage: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ApiProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    name: &'a str,
    protocol_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StageProperties {
    api_id: Value,
    auto_deploy: bool,
    stage_name: &'static str,
}

/// An `AWS::ApiGatewayV2::Api` with protocol `HTTP`
#[derive(Debug, Clone)]
pub struct HttpApi {
    id: String,
    logical_id: String,
    name: String,
    default_stage: Option<String>,
    /// integration construct id -> logical id, so routes share integrations
    integrations: BTreeMap<String, String>,
    routes: Vec<HttpRoute>,
}

impl HttpApi {
    pub fn new(stack: &mut Stack, id: &str, props: HttpApiProps) -> Result<Self, StackError> {
        let name = props.api_name.unwrap_or_else(|| id.to_string());

        let resource = Resource::new("AWS::ApiGatewayV2::Api").with_properties(&ApiProperties {
            description: props.description.as_deref(),
            name: &name,
            protocol_type: "HTTP",
        })?;
        let logical_id = stack.add_resource(&[id, "Resource"], resource)?;

        let default_stage = if props.create_default_stage {
            let stage = Resource::new("AWS::ApiGatewayV2::Stage").with_properties(
                &StageProperties {
                    api_id: ref_(&logical_id),
                    auto_deploy: true,
                    stage_name: DEFAULT_STAGE_NAME,
                },
            )?;
            Some(stack.add_resource(&[id, "DefaultStage", "Resource"], stage)?)
        } else {
            None
        };

        debug!(api = %logical_id, name = %name, "Declared HTTP API");
        Ok(Self {
            id: id.to_string(),
            logical_id,
            name,
            default_stage,
            integrations: BTreeMap::new(),
            routes: Vec::new(),
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api_id(&self) -> Value {
        ref_(&self.logical_id)
    }

    pub fn default_stage_logical_id(&self) -> Option<&str> {
        self.default_stage.as_deref()
    }

    pub fn routes(&self) -> &[HttpRoute] {
        &self.routes
    }

    /// `https://<api-id>.execute-api.<region>.<url-suffix>`
    pub fn api_endpoint(&self, stack: &Stack) -> Value {
        join(
            "",
            vec![
                json!("https://"),
                self.api_id(),
                json!(".execute-api."),
                stack.region(),
                json!("."),
                stack.url_suffix(),
            ],
        )
    }

    /// Declare one route per method, each proxying to the integration's
    /// function and allowed to invoke it.
    pub fn add_routes(
        &mut self,
        stack: &mut Stack,
        options: &AddRoutesOptions<'_>,
    ) -> Result<Vec<HttpRoute>, StackError> {
        validate_path(&self.id, options.path)?;
        if options.methods.is_empty() {
            return Err(StackError::invalid_property(
                &self.id,
                format!("No methods given for route {}", options.path),
            ));
        }

        let integration_id = self.integration(stack, &options.integration)?;

        let mut added = Vec::with_capacity(options.methods.len());
        for &method in &options.methods {
            let construct_id = route_construct_id(method, options.path);
            let key = route_key(method, options.path);

            let route = Resource::new("AWS::ApiGatewayV2::Route").with_properties(
                &RouteProperties {
                    api_id: self.api_id(),
                    authorization_type: "NONE",
                    route_key: key.clone(),
                    target: join("", vec![json!("integrations/"), ref_(&integration_id)]),
                },
            )?;
            let logical_id = stack.add_resource(&[&self.id, &construct_id, "Resource"], route)?;

            let source_arn = join(
                "",
                vec![
                    json!("arn:"),
                    stack.partition(),
                    json!(":execute-api:"),
                    stack.region(),
                    json!(":"),
                    stack.account(),
                    json!(":"),
                    self.api_id(),
                    json!(format!("/*/*{}", options.path)),
                ],
            );
            let permission_name = format!("{}-Permission", options.integration.id);
            let permission_id = options.integration.handler.add_permission(
                stack,
                &[&self.id, &construct_id, &permission_name],
                &Permission::invoke_from("apigateway.amazonaws.com", source_arn),
            )?;

            debug!(route = %logical_id, route_key = %key, "Declared route");
            let route = HttpRoute {
                logical_id,
                route_key: key,
                integration_id: integration_id.clone(),
                permission_id,
            };
            self.routes.push(route.clone());
            added.push(route);
        }

        Ok(added)
    }

    /// Logical id of the integration, declared on first use
    fn integration(
        &mut self,
        stack: &mut Stack,
        integration: &HttpLambdaIntegration<'_>,
    ) -> Result<String, StackError> {
        if let Some(existing) = self.integrations.get(integration.id) {
            return Ok(existing.clone());
        }

        let resource = Resource::new("AWS::ApiGatewayV2::Integration").with_properties(
            &IntegrationProperties {
                api_id: self.api_id(),
                integration_type: "AWS_PROXY",
                integration_uri: integration.handler.function_arn(),
                payload_format_version: integration.payload_format_version,
            },
        )?;
        let logical_id = stack.add_resource(&[&self.id, integration.id, "Resource"], resource)?;

        self.integrations
            .insert(integration.id.to_string(), logical_id.clone());
        Ok(logical_id)
    }
}
