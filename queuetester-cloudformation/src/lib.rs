//! The queue tester stack
//!
//! Declares an ordered, encrypted queue between a writer function exposed
//! over HTTP and a reader function triggered by the queue, and synthesizes
//! it into a CloudFormation template.

mod settings;
mod stack;
mod synth;

pub use settings::{
    ApiSettings, DeadLetterSettings, FunctionSettings, KeySettings, QueueSettings, StackSettings,
    StackVariant,
};
pub use stack::QueueTesterStack;
pub use synth::{render, synthesize, OutputFormat};
