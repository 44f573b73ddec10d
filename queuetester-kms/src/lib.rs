//! KMS constructs for queuetester
//!
//! A customer managed key with an account-root key policy, an optional
//! alias, and grants that hand key usage to execution roles.

mod alias;
mod key;

pub use alias::normalize_alias_name;
pub use key::{Key, KeyProps};
