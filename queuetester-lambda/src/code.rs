//! Function code assets

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use queuetester_core::{sub, StackEnvironment};

/// Qualifier of the default bootstrap resources
const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";

/// Where a function's deployment package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    /// A local entry point bundled into a zip in the bootstrap asset bucket.
    ///
    /// The archive key is the SHA-256 of the entry path, so the same entry
    /// always maps to the same object.
    Asset { entry: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CodeProperties {
    s3_bucket: Value,
    s3_key: String,
}

impl Code {
    pub fn asset(entry: impl Into<String>) -> Self {
        Self::Asset {
            entry: entry.into(),
        }
    }

    pub fn asset_hash(entry: &str) -> String {
        hex::encode(Sha256::digest(entry.as_bytes()))
    }

    pub(crate) fn to_properties(&self, env: &StackEnvironment) -> CodeProperties {
        match self {
            Self::Asset { entry } => {
                let bucket = format!(
                    "cdk-{}-assets-{}-{}",
                    BOOTSTRAP_QUALIFIER,
                    env.account_sub(),
                    env.region_sub()
                );
                CodeProperties {
                    // Only unresolved pseudo parameters need a substitution
                    s3_bucket: if bucket.contains("${") {
                        sub(&bucket)
                    } else {
                        json!(bucket)
                    },
                    s3_key: format!("{}.zip", Self::asset_hash(entry)),
                }
            }
        }
    }
}
