//! Lambda constructs for queuetester
//!
//! Provides:
//! - Function declarations with an execution role and structured logging
//! - Code assets for custom-runtime (`bootstrap`) binaries
//! - SQS event source mappings
//! - Resource-based invoke permissions

mod code;
mod event_source;
mod function;
mod runtime;

pub use code::Code;
pub use event_source::{EventSourceMapping, SqsEventSource};
pub use function::{Function, FunctionProps, Permission};
pub use runtime::{LogFormat, Runtime};
