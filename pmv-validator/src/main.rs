//! Validator CLI (pmv-validator) - Main entry point
//!
//! Runs the validation pipeline over request files and prints the structured
//! result as pretty JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;

use pmv_validator::{BatchRequest, ValidationOptions, ValidationService, ValidatorConfig};

/// Command-line arguments for pmv-validator
#[derive(Parser, Debug)]
#[command(name = "pmv-validator")]
#[command(about = "Validate AI-generated property-management responses")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PMV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one request: `{response, context, options?}`
    Validate {
        file: PathBuf,
    },

    /// Validate a JSON array of requests
    Batch {
        file: PathBuf,

        /// Disable auto-applied corrections for the whole batch
        #[arg(long)]
        no_auto_correct: bool,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ValidatorConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level).to_string();
    pmv_common::logging::init(&level);

    info!("Starting PMV validator");
    let service = ValidationService::new(config);

    let output = match args.command {
        Command::Validate { file } => {
            let BatchRequest {
                mut response,
                context,
                options,
            } = read_json(&file)?;
            let options = options.unwrap_or_default();
            let result = service
                .validate(&mut response, &context, &options)
                .await
                .context("Validation rejected the request")?;
            serde_json::json!({ "response": response, "result": result })
        }
        Command::Batch { file, no_auto_correct } => {
            let requests: Vec<BatchRequest> = read_json(&file)?;
            let options = ValidationOptions {
                auto_correct: !no_auto_correct,
                ..Default::default()
            };
            let batch = service
                .validate_batch(requests, &options)
                .await
                .context("Batch rejected")?;
            serde_json::to_value(batch)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    service.shutdown().await;
    Ok(())
}
