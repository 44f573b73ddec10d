//! Stack settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which shape of the stack to declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackVariant {
    /// Writer behind `POST /write`, API URL exported
    #[default]
    HttpApi,
    /// No API; both functions are told the queue URL
    QueueOnly,
}

impl StackVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackVariant::HttpApi => "http-api",
            StackVariant::QueueOnly => "queue-only",
        }
    }
}

impl fmt::Display for StackVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http-api" => Ok(StackVariant::HttpApi),
            "queue-only" => Ok(StackVariant::QueueOnly),
            other => Err(format!(
                "Unknown stack variant '{}', expected http-api or queue-only",
                other
            )),
        }
    }
}

/// Everything needed to declare the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSettings {
    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub variant: StackVariant,

    /// Concrete deployment account; pseudo parameter when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub key: KeySettings,

    #[serde(default)]
    pub queue: QueueSettings,

    /// Redrive to a dead-letter queue; off unless configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<DeadLetterSettings>,

    #[serde(default = "default_reader")]
    pub reader: FunctionSettings,

    #[serde(default = "default_writer")]
    pub writer: FunctionSettings,

    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            stack_name: default_stack_name(),
            description: None,
            variant: StackVariant::default(),
            account: None,
            region: None,
            key: KeySettings::default(),
            queue: QueueSettings::default(),
            dead_letter: None,
            reader: default_reader(),
            writer: default_writer(),
            api: ApiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySettings {
    #[serde(default = "default_key_id")]
    pub id: String,

    #[serde(default = "default_key_alias")]
    pub alias: String,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            id: default_key_id(),
            alias: default_key_alias(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_queue_id")]
    pub id: String,

    /// Messages per reader invocation
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            id: default_queue_id(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterSettings {
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSettings {
    pub id: String,
    pub function_name: String,
    /// Handler source, packaged as an opaque asset
    pub entry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_id")]
    pub id: String,

    #[serde(default = "default_api_name")]
    pub name: String,

    #[serde(default = "default_api_description")]
    pub description: String,

    #[serde(default = "default_route_path")]
    pub route_path: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            id: default_api_id(),
            name: default_api_name(),
            description: default_api_description(),
            route_path: default_route_path(),
        }
    }
}

fn default_stack_name() -> String {
    "GoQueueTesterStack".to_string()
}

fn default_key_id() -> String {
    "GoQueueTester-KMS".to_string()
}

fn default_key_alias() -> String {
    "alias/GoQueueTester-KMS".to_string()
}

fn default_queue_id() -> String {
    "GoQueueTester-Queue".to_string()
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_receive_count() -> u32 {
    3
}

fn default_reader() -> FunctionSettings {
    FunctionSettings {
        id: "GoReaderLambda".to_string(),
        function_name: "handleReaderRequest".to_string(),
        entry: "../cmd/reader/main.go".to_string(),
    }
}

fn default_writer() -> FunctionSettings {
    FunctionSettings {
        id: "GoWriterLambda".to_string(),
        function_name: "handleWriterRequest".to_string(),
        entry: "../cmd/writer/main.go".to_string(),
    }
}

fn default_api_id() -> String {
    "QueueTesterApi".to_string()
}

fn default_api_name() -> String {
    "Go Queue Tester Service".to_string()
}

fn default_api_description() -> String {
    "This service serves queue testing functionality.".to_string()
}

fn default_route_path() -> String {
    "/write".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StackSettings::default();
        assert_eq!(settings.stack_name, "GoQueueTesterStack");
        assert_eq!(settings.variant, StackVariant::HttpApi);
        assert_eq!(settings.key.alias, "alias/GoQueueTester-KMS");
        assert_eq!(settings.queue.batch_size, 10);
        assert_eq!(settings.reader.function_name, "handleReaderRequest");
        assert_eq!(settings.writer.entry, "../cmd/writer/main.go");
        assert_eq!(settings.api.route_path, "/write");
        assert!(settings.dead_letter.is_none());
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings: StackSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, StackSettings::default());
    }

    #[test]
    fn test_partial_overrides() {
        let settings: StackSettings = serde_json::from_value(serde_json::json!({
            "variant": "queue-only",
            "queue": {"batch_size": 5},
            "dead_letter": {}
        }))
        .unwrap();

        assert_eq!(settings.variant, StackVariant::QueueOnly);
        assert_eq!(settings.queue.batch_size, 5);
        assert_eq!(settings.queue.id, "GoQueueTester-Queue");
        assert_eq!(settings.dead_letter.unwrap().max_receive_count, 3);
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("http-api".parse::<StackVariant>(), Ok(StackVariant::HttpApi));
        assert_eq!("queue-only".parse::<StackVariant>(), Ok(StackVariant::QueueOnly));
        assert!("both".parse::<StackVariant>().is_err());
        assert_eq!(StackVariant::QueueOnly.to_string(), "queue-only");
    }
}
