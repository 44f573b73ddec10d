//! IAM constructs for queuetester
//!
//! Provides the policy language used by every other construct crate:
//! - Policy documents and statements (allow/deny, principals, conditions)
//! - Execution roles with a lazily created default inline policy
//! - The `Grantable` seam through which resources grant access to principals

pub mod policy;
mod role;

pub use policy::{Effect, PolicyDocument, PolicyStatement, Principal};
pub use role::{grant, Grantable, Role, RoleProps};
