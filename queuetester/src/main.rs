//! queuetester - declare the queue tester stack
//!
//! Synthesizes an ordered, encrypted queue with a writer function behind an
//! HTTP API and a batched reader function into a CloudFormation template.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queuetester_cloudformation::{
    render, OutputFormat, QueueTesterStack, StackSettings, StackVariant,
};
use queuetester_core::Template;

#[derive(Parser, Debug)]
#[command(name = "queuetester")]
#[command(about = "Synthesize the queue tester stack", long_about = None)]
struct Args {
    /// Settings file (toml, yaml or json); defaults to ./queuetester.* if present
    #[arg(long, global = true, env = "QUEUETESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "QUEUETESTER_LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, env = "QUEUETESTER_LOG_FORMAT")]
    #[arg(default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print or write the synthesized template
    Synth {
        /// Stack variant: http-api or queue-only
        #[arg(long)]
        variant: Option<StackVariant>,

        /// Template format: json or yaml
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the declared resources as `logical-id  type`
    Resources {
        #[arg(long)]
        variant: Option<StackVariant>,
    },

    /// Print the effective settings as TOML
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level, args.log_format);

    let mut settings = config::load(args.config.as_deref()).context("loading settings")?;

    match args.command {
        Command::Synth {
            variant,
            format,
            output,
        } => {
            if let Some(variant) = variant {
                settings.variant = variant;
            }
            let template = synthesize(&settings)?;
            let mut rendered = render(&template, format)?;
            if !rendered.ends_with('\n') {
                rendered.push('\n');
            }

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("writing template to {}", path.display()))?;
                    info!(path = %path.display(), format = %format, "Wrote template");
                }
                None => print!("{}", rendered),
            }
        }
        Command::Resources { variant } => {
            if let Some(variant) = variant {
                settings.variant = variant;
            }
            let template = synthesize(&settings)?;
            for (logical_id, resource) in &template.resources {
                println!("{}  {}", logical_id, resource.resource_type);
            }
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the template, logs go to stderr
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn synthesize(settings: &StackSettings) -> anyhow::Result<Template> {
    let stack = QueueTesterStack::new(settings)
        .with_context(|| format!("declaring stack {}", settings.stack_name))?;
    Ok(stack.synthesize()?)
}
