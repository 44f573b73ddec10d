//! SQS constructs for queuetester
//!
//! Provides the queue declaration used by the stack:
//! - Standard and FIFO queues with name/ordering consistency checks
//! - Key-backed encryption at rest
//! - A queue policy that refuses requests made without TLS
//! - Dead-letter redrive
//! - Send and consume grants (including the matching key usage)

mod queue;

pub use queue::{DeadLetterQueue, Queue, QueueProps};
