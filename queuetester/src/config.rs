//! Configuration management

use std::path::Path;

use queuetester_cloudformation::StackSettings;

const DEFAULT_CONFIG_FILE: &str = "queuetester";
const ENV_PREFIX: &str = "QUEUETESTER";

/// Load stack settings from `path` (or an optional `queuetester.{toml,yaml,json}`
/// in the working directory), overridden by `QUEUETESTER__*` variables, e.g.
/// `QUEUETESTER__QUEUE__BATCH_SIZE=5`
pub fn load(path: Option<&Path>) -> anyhow::Result<StackSettings> {
    load_from(path, environment())
}

fn environment() -> config::Environment {
    // Values stay strings until deserialized so account ids keep leading zeros
    config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn load_from(path: Option<&Path>, env: config::Environment) -> anyhow::Result<StackSettings> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config = config::Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?;

    Ok(config.try_deserialize::<StackSettings>()?)
}
