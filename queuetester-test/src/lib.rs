//! Test utilities for queuetester
//!
//! Provides assertions over synthesized templates:
//! - Look up resources and outputs by type or id
//! - Match properties with partial, exact and wildcard patterns
//! - Count resources of a type
//!
//! ## Usage
//!
//! ```rust,no_run
//! use queuetester_core::Stack;
//! use queuetester_test::{Match, Template};
//!
//! let stack = Stack::new("TestStack").unwrap();
//! // ... declare constructs ...
//! let template = Template::from_stack(&stack);
//! template.has_resource_properties(
//!     "AWS::SQS::Queue",
//!     Match::object_like([
//!         ("FifoQueue", Match::from(true)),
//!         ("KmsMasterKeyId", Match::any_value()),
//!     ]),
//! );
//! ```

mod matcher;
mod template;

pub use matcher::Match;
pub use template::{AssertionError, Template};

/// Route `tracing` output to the test harness; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
