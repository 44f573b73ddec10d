//! Lambda runtimes and log formats

use serde::{Deserialize, Serialize};

/// Custom runtime that executes a `bootstrap` binary
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Runtime {
    #[default]
    #[serde(rename = "provided.al2")]
    ProvidedAl2,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvidedAl2 => "provided.al2",
        }
    }
}

/// Format of the function's application and platform logs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    #[serde(rename = "JSON")]
    Json,
}
