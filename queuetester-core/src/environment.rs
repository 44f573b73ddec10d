//! Account and region a stack is synthesized for

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intrinsic::Pseudo;

/// Target environment of a stack.
///
/// Unset fields keep the template environment-agnostic: they render as the
/// matching pseudo parameter and are resolved at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnvironment {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl StackEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// Environment-agnostic: everything resolves through pseudo parameters
    pub fn agnostic() -> Self {
        Self::default()
    }

    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }

    pub fn account_value(&self) -> Value {
        self.account
            .as_ref()
            .map_or_else(|| Pseudo::AccountId.to_value(), |a| Value::String(a.clone()))
    }

    pub fn region_value(&self) -> Value {
        self.region
            .as_ref()
            .map_or_else(|| Pseudo::Region.to_value(), |r| Value::String(r.clone()))
    }

    /// `${AWS::AccountId}` or the concrete account, for use inside `Fn::Sub`
    pub fn account_sub(&self) -> String {
        self.account
            .clone()
            .unwrap_or_else(|| format!("${{{}}}", Pseudo::AccountId.as_str()))
    }

    /// `${AWS::Region}` or the concrete region, for use inside `Fn::Sub`
    pub fn region_sub(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| format!("${{{}}}", Pseudo::Region.as_str()))
    }
}
