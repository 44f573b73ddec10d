//! Core types for queuetester
//!
//! This crate provides the template model and the primitives every
//! construct crate builds on: intrinsic functions, logical id derivation,
//! the stack container and the shared error type.

pub mod environment;
pub mod error;
pub mod intrinsic;
pub mod logical_id;
pub mod stack;
pub mod template;

pub use environment::StackEnvironment;
pub use error::{ErrorCode, StackError};
pub use intrinsic::{get_att, join, ref_, sub, Pseudo, Reference};
pub use stack::Stack;
pub use template::{Output, RemovalPolicy, Resource, Template};
