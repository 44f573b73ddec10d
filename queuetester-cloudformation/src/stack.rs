//! The queue tester stack definition

use std::collections::BTreeMap;
use tracing::info;

use queuetester_apigateway::{
    AddRoutesOptions, HttpApi, HttpApiProps, HttpLambdaIntegration, HttpMethod,
};
use queuetester_core::{Output, Stack, StackEnvironment, StackError, Template};
use queuetester_kms::{Key, KeyProps};
use queuetester_lambda::{Function, FunctionProps, LogFormat, SqsEventSource};
use queuetester_sqs::{DeadLetterQueue, Queue, QueueProps};

use crate::settings::{FunctionSettings, StackSettings, StackVariant};
use crate::synth::synthesize;

const QUEUE_URL_ENV: &str = "QUEUE_URL";
const API_URL_OUTPUT: &str = "ApiUrl";
const WRITER_INTEGRATION_ID: &str = "WriterIntegration";

/// A FIFO queue encrypted with its own key, a writer allowed to send to it
/// and a reader consuming it in batches. The HTTP variant also exposes the
/// writer through an HTTP API and exports the API URL.
#[derive(Debug)]
pub struct QueueTesterStack {
    stack: Stack,
    variant: StackVariant,
    key: Key,
    queue: Queue,
    dead_letter_queue: Option<Queue>,
    reader: Function,
    writer: Function,
    api: Option<HttpApi>,
}

impl QueueTesterStack {
    pub fn new(settings: &StackSettings) -> Result<Self, StackError> {
        let mut stack = Stack::new(&settings.stack_name)?.with_environment(environment(settings));
        if let Some(description) = &settings.description {
            stack = stack.with_description(description);
        }

        let key = Key::new(
            &mut stack,
            &settings.key.id,
            KeyProps {
                alias: Some(settings.key.alias.clone()),
                ..KeyProps::default()
            },
        )?;

        let dead_letter_queue = match &settings.dead_letter {
            Some(_) => Some(Queue::new(
                &mut stack,
                &format!("{}-DLQ", settings.queue.id),
                QueueProps {
                    fifo: true,
                    enforce_ssl: true,
                    encryption_master_key: Some(&key),
                    ..QueueProps::default()
                },
            )?),
            None => None,
        };

        let queue = Queue::new(
            &mut stack,
            &settings.queue.id,
            QueueProps {
                fifo: true,
                enforce_ssl: true,
                encryption_master_key: Some(&key),
                dead_letter_queue: dead_letter_queue
                    .as_ref()
                    .zip(settings.dead_letter.as_ref())
                    .map(|(queue, dlq)| DeadLetterQueue {
                        queue,
                        max_receive_count: dlq.max_receive_count,
                    }),
                ..QueueProps::default()
            },
        )?;

        let reader_env = match settings.variant {
            StackVariant::HttpApi => BTreeMap::new(),
            StackVariant::QueueOnly => queue_url_env(&queue),
        };
        let mut reader = Function::new(
            &mut stack,
            &settings.reader.id,
            function_props(&settings.reader, reader_env),
        )?;

        let mut writer = Function::new(
            &mut stack,
            &settings.writer.id,
            function_props(&settings.writer, queue_url_env(&queue)),
        )?;

        queue.grant_send_messages(&mut stack, &mut writer)?;
        queue.grant_consume_messages(&mut stack, &mut reader)?;

        reader.add_event_source(
            &mut stack,
            &SqsEventSource::new(&queue).with_batch_size(settings.queue.batch_size),
        )?;

        let api = match settings.variant {
            StackVariant::HttpApi => {
                let mut api = HttpApi::new(
                    &mut stack,
                    &settings.api.id,
                    HttpApiProps {
                        api_name: Some(settings.api.name.clone()),
                        description: Some(settings.api.description.clone()),
                        ..HttpApiProps::default()
                    },
                )?;
                api.add_routes(
                    &mut stack,
                    &AddRoutesOptions {
                        path: &settings.api.route_path,
                        methods: vec![HttpMethod::Post],
                        integration: HttpLambdaIntegration::new(WRITER_INTEGRATION_ID, &writer),
                    },
                )?;

                let endpoint = api.api_endpoint(&stack);
                stack.add_output(API_URL_OUTPUT, Output::new(endpoint))?;
                Some(api)
            }
            StackVariant::QueueOnly => None,
        };

        info!(
            stack = %stack.name(),
            variant = %settings.variant,
            resources = stack.template().resources.len(),
            "Declared queue tester stack"
        );
        Ok(Self {
            stack,
            variant: settings.variant,
            key,
            queue,
            dead_letter_queue,
            reader,
            writer,
            api,
        })
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn variant(&self) -> StackVariant {
        self.variant
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn dead_letter_queue(&self) -> Option<&Queue> {
        self.dead_letter_queue.as_ref()
    }

    pub fn reader(&self) -> &Function {
        &self.reader
    }

    pub fn writer(&self) -> &Function {
        &self.writer
    }

    pub fn api(&self) -> Option<&HttpApi> {
        self.api.as_ref()
    }

    pub fn synthesize(&self) -> Result<Template, StackError> {
        synthesize(&self.stack)
    }
}

fn environment(settings: &StackSettings) -> StackEnvironment {
    StackEnvironment {
        account: settings.account.clone(),
        region: settings.region.clone(),
    }
}

fn queue_url_env(queue: &Queue) -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([(QUEUE_URL_ENV.to_string(), queue.queue_url())])
}

fn function_props(
    settings: &FunctionSettings,
    environment: BTreeMap<String, serde_json::Value>,
) -> FunctionProps {
    FunctionProps {
        function_name: Some(settings.function_name.clone()),
        environment,
        logging_format: Some(LogFormat::Json),
        ..FunctionProps::go(settings.entry.as_str())
    }
}
