use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};
use remedy_rs::config::{LayeredConfig, LayeredConfigOptions, RemedyConfig};
use remedy_rs::core::ComplaintEngine;
use remedy_rs::providers::build_providers;
use remedy_rs::server::{AppState, HttpTelegramApi, serve};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "remedy",
    version,
    about = "Telegram assistant that records undelivered-medication complaints"
)]
struct Cli {
    /// Extra config file applied on top of the discovered layers.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding `server.bind`.
    #[arg(long, global = true)]
    bind: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the webhook server (default).
    Serve,
    /// Load and validate the effective config, then print it.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    remedy_rs::init_logging();
    let cli = Cli::parse();
    let layered = load_config(cli.config.as_deref())?;
    let mut config = layered.config.clone();
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::CheckConfig => check_config(&layered, &config),
    }
}

fn load_config(runtime: Option<&Path>) -> anyhow::Result<LayeredConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let mut options = LayeredConfigOptions::new(cwd);
    if let Some(path) = runtime {
        options = options.with_runtime_path(path);
    }
    let layered = RemedyConfig::load_layered_with_options(options)?;
    layered.config.validate()?;
    Ok(layered)
}

fn check_config(layered: &LayeredConfig, config: &RemedyConfig) -> anyhow::Result<()> {
    for layer in &layered.layers {
        match &layer.disabled_reason {
            Some(reason) => println!("# {:?} layer skipped: {}", layer.source, reason),
            None => println!(
                "# {:?} layer: {}",
                layer.source,
                layer
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default()
            ),
        }
    }
    let rendered = serde_json::to_string_pretty(config).context("failed to render config")?;
    println!("{rendered}");
    Ok(())
}

async fn run_server(config: RemedyConfig) -> anyhow::Result<()> {
    let providers = build_providers(&config)?;
    let engine = ComplaintEngine::builder(&config)
        .reader(providers.reader)
        .generator(providers.generator)
        .sink(providers.sink)
        .build()?;
    if !config.sessions.enabled {
        warn!("session persistence disabled; state is lost on restart");
    }
    let api = HttpTelegramApi::new(&config.server)?;
    let state = AppState::new(Arc::new(engine), Arc::new(api));
    info!(
        "starting complaint assistant (bind={}, sink={})",
        config.server.bind, config.sink.provider
    );
    serve(&config.server.bind, state).await
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["remedy", "--bind", "127.0.0.1:9000"]).expect("parse");
        assert_eq!(cli.command, None);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn check_config_accepts_runtime_layer() {
        let cli = Cli::try_parse_from(["remedy", "check-config", "--config", "extra.json5"])
            .expect("parse");
        assert_eq!(cli.command, Some(Command::CheckConfig));
        assert_eq!(
            cli.config.as_deref().and_then(|path| path.to_str()),
            Some("extra.json5")
        );
    }
}
