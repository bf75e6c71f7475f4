mod cli;
mod ui;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::warn;

use cli::{Cli, Command};
use genflow::config::DEFAULT_CONFIG_FILE;
use genflow::{CancellationToken, GenflowConfig, JobOrchestrator, Provider};
use ui::JobProgress;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    genflow::logging::init_logging(cli.verbose);

    let config = load_config(&cli)?;

    let orchestrator = JobOrchestrator::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling job");
            on_signal.cancel();
        }
    });

    let (progress, result) = match cli.command {
        Command::Run {
            operation,
            provider,
            fields,
            payload,
        } => {
            let payload = build_payload(payload.as_deref(), fields)?;
            let progress = JobProgress::start(&format!("{operation} on {provider}"));
            let result = orchestrator
                .run(provider, operation, payload, &cancel, &progress)
                .await;
            (progress, result)
        }
        Command::Image {
            prompt,
            negative_prompt,
            width,
            height,
        } => {
            let mut payload = Map::new();
            payload.insert("prompt".into(), Value::String(prompt));
            if let Some(negative) = negative_prompt {
                payload.insert("negative_prompt".into(), Value::String(negative));
            }
            if let Some(width) = width {
                payload.insert("width".into(), Value::from(width));
            }
            if let Some(height) = height {
                payload.insert("height".into(), Value::from(height));
            }
            let progress = JobProgress::start("generating image");
            let result = orchestrator.generate_image(payload, &cancel, &progress).await;
            (progress, result)
        }
        Command::Chat { prompt } => {
            let progress = JobProgress::start("chat");
            let result = orchestrator.chat(&prompt, &cancel, &progress).await;
            (progress, result)
        }
        Command::Providers => {
            list_providers(orchestrator.config());
            return Ok(ExitCode::SUCCESS);
        }
    };

    progress.complete(&result);
    match result {
        Ok(generation) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&generation)?);
            } else {
                for artifact in &generation.artifacts {
                    println!("{}", ui::display_artifact(artifact));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn list_providers(config: &GenflowConfig) {
    for provider in Provider::ALL {
        let key = if config.has_key(provider) { "key set" } else { "no key" };
        println!("{:<12} {:<20} {key}", provider.as_str(), provider.env_key());
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<GenflowConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf());
    if cli.config.is_some() && !path.exists() {
        bail!("config file not found: {}", path.display());
    }
    let mut config = GenflowConfig::load_from(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    if let Some(max_attempts) = cli.max_attempts {
        config.poll.max_attempts = max_attempts;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll.interval_ms = interval_ms;
    }
    config.validate()?;
    Ok(config)
}

/// Payload from an optional JSON file, overlaid with `--field` pairs.
fn build_payload(
    file: Option<&Path>,
    fields: Vec<(String, String)>,
) -> anyhow::Result<Map<String, Value>> {
    let mut payload = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                _ => bail!("{} must contain a JSON object", path.display()),
            }
        }
        None => Map::new(),
    };
    for (key, value) in fields {
        payload.insert(key, Value::String(value));
    }
    Ok(payload)
}
