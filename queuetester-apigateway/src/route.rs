//! Routes and Lambda proxy integrations

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use queuetester_core::StackError;
use queuetester_lambda::Function;

/// HTTP method of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Any,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Any => "ANY",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the event a proxy integration hands to the function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PayloadFormatVersion {
    #[serde(rename = "1.0")]
    V1,
    #[default]
    #[serde(rename = "2.0")]
    V2,
}

/// Proxy every request on a route to a Lambda function
#[derive(Debug, Clone, Copy)]
pub struct HttpLambdaIntegration<'a> {
    pub id: &'a str,
    pub handler: &'a Function,
    pub payload_format_version: PayloadFormatVersion,
}

impl<'a> HttpLambdaIntegration<'a> {
    pub fn new(id: &'a str, handler: &'a Function) -> Self {
        Self {
            id,
            handler,
            payload_format_version: PayloadFormatVersion::default(),
        }
    }
}

/// Routes to add to an API: every method in `methods` on `path`
#[derive(Debug, Clone)]
pub struct AddRoutesOptions<'a> {
    pub path: &'a str,
    pub methods: Vec<HttpMethod>,
    pub integration: HttpLambdaIntegration<'a>,
}

/// A declared `AWS::ApiGatewayV2::Route`
#[derive(Debug, Clone)]
pub struct HttpRoute {
    pub(crate) logical_id: String,
    pub(crate) route_key: String,
    pub(crate) integration_id: String,
    pub(crate) permission_id: String,
}

impl HttpRoute {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// e.g. `POST /write`
    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    pub fn integration_logical_id(&self) -> &str {
        &self.integration_id
    }

    pub fn permission_logical_id(&self) -> &str {
        &self.permission_id
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct IntegrationProperties {
    pub api_id: Value,
    pub integration_type: &'static str,
    pub integration_uri: Value,
    pub payload_format_version: PayloadFormatVersion,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RouteProperties {
    pub api_id: Value,
    pub authorization_type: &'static str,
    pub route_key: String,
    pub target: Value,
}

/// Check a route path the way API Gateway does: it starts with `/` and, unless
/// it is the root, does not end with one
pub(crate) fn validate_path(scope: &str, path: &str) -> Result<(), StackError> {
    if path != "/" && (!path.starts_with('/') || path.ends_with('/')) {
        return Err(StackError::invalid_property(
            scope,
            format!(
                "A route path must always start with a \"/\" and not end with a \"/\": {}",
                path
            ),
        ));
    }
    Ok(())
}

pub(crate) fn route_key(method: HttpMethod, path: &str) -> String {
    format!("{} {}", method, path)
}

/// Construct id of a route; `/` is not allowed in construct ids
pub(crate) fn route_construct_id(method: HttpMethod, path: &str) -> String {
    format!("{}{}", method, path).replace('/', "--")
}
