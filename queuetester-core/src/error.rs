//! Declaration-time error types

use thiserror::Error;

/// Error codes raised while declaring or synthesizing a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Construct id was empty or produced an empty logical id
    InvalidId,
    /// Two resources resolved to the same logical id
    DuplicateLogicalId,
    /// A Ref, GetAtt, Sub or DependsOn names a resource that is not declared
    UnresolvedReference,
    /// A property value violates the resource's constraints
    InvalidProperty,
    /// A resource looked up by logical id does not exist
    NotFound,
    /// Rendering the template failed
    Serialization,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidId => "InvalidId",
            Self::DuplicateLogicalId => "DuplicateLogicalId",
            Self::UnresolvedReference => "UnresolvedReference",
            Self::InvalidProperty => "InvalidProperty",
            Self::NotFound => "NotFound",
            Self::Serialization => "Serialization",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by construct builders and synthesis
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct StackError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
}

impl StackError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    /// Attach the logical id the error concerns
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn invalid_property(resource: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidProperty, message).with_resource(resource)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Resource {} is not declared in this stack", resource),
        )
        .with_resource(resource)
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::Serialization, err.to_string())
    }
}
