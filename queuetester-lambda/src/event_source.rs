//! Queue-triggered invocation

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use queuetester_core::{Resource, Stack, StackError};
use queuetester_sqs::Queue;

use crate::function::Function;

const MAX_BATCH_SIZE: u32 = 10;
const MAX_BATCH_SIZE_WITH_WINDOW: u32 = 10_000;
const MAX_BATCHING_WINDOW_SECS: u32 = 300;

/// Deliver messages from a queue to a function in batches
#[derive(Debug, Clone, Copy)]
pub struct SqsEventSource<'a> {
    pub queue: &'a Queue,
    pub batch_size: Option<u32>,
    pub max_batching_window_secs: Option<u32>,
    pub report_batch_item_failures: bool,
    pub enabled: bool,
}

impl<'a> SqsEventSource<'a> {
    pub fn new(queue: &'a Queue) -> Self {
        Self {
            queue,
            batch_size: None,
            max_batching_window_secs: None,
            report_batch_item_failures: false,
            enabled: true,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    fn validate(&self, scope: &str) -> Result<(), StackError> {
        if let Some(window) = self.max_batching_window_secs {
            if self.queue.is_fifo() {
                return Err(StackError::invalid_property(
                    scope,
                    "Batching window is not supported for FIFO queues",
                ));
            }
            if window > MAX_BATCHING_WINDOW_SECS {
                return Err(StackError::invalid_property(
                    scope,
                    format!(
                        "Maximum batching window must be {} seconds or less (given {})",
                        MAX_BATCHING_WINDOW_SECS, window
                    ),
                ));
            }
        }

        if let Some(batch_size) = self.batch_size {
            let max = if self.max_batching_window_secs.is_some() {
                MAX_BATCH_SIZE_WITH_WINDOW
            } else {
                MAX_BATCH_SIZE
            };
            if batch_size < 1 || batch_size > max {
                return Err(StackError::invalid_property(
                    scope,
                    format!(
                        "Maximum batch size must be between 1 and {} inclusive (given {})",
                        max, batch_size
                    ),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EventSourceMappingProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    event_source_arn: Value,
    function_name: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    function_response_types: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maximum_batching_window_in_seconds: Option<u32>,
}

/// A declared `AWS::Lambda::EventSourceMapping`
#[derive(Debug, Clone)]
pub struct EventSourceMapping {
    logical_id: String,
}

impl EventSourceMapping {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl Function {
    /// Subscribe the function to a queue.
    ///
    /// The function is granted consume permissions on the queue (and its key)
    /// so the poller can receive and delete on its behalf.
    pub fn add_event_source(
        &mut self,
        stack: &mut Stack,
        source: &SqsEventSource<'_>,
    ) -> Result<EventSourceMapping, StackError> {
        source.validate(self.id())?;

        let mapping_id = format!("SqsEventSource:{}{}", stack.name(), source.queue.logical_id());
        let resource = Resource::new("AWS::Lambda::EventSourceMapping").with_properties(
            &EventSourceMappingProperties {
                batch_size: source.batch_size,
                enabled: (!source.enabled).then_some(false),
                event_source_arn: source.queue.queue_arn(),
                function_name: self.function_ref(),
                function_response_types: if source.report_batch_item_failures {
                    vec!["ReportBatchItemFailures"]
                } else {
                    Vec::new()
                },
                maximum_batching_window_in_seconds: source.max_batching_window_secs,
            },
        )?;

        let function_id = self.id().to_string();
        let logical_id = stack.add_resource(&[&function_id, &mapping_id, "Resource"], resource)?;

        source.queue.grant_consume_messages(stack, self)?;

        debug!(
            mapping = %logical_id,
            queue = %source.queue.logical_id(),
            batch_size = ?source.batch_size,
            "Declared event source mapping"
        );
        Ok(EventSourceMapping { logical_id })
    }
}
