// EcoAgent returns assistant
// Main entry point for the ecoagent binary

use clap::Parser;
use eco_engine::cli::{Cli, Command};
use eco_engine::config::Config;
use eco_engine::handlers::{handle_ask, handle_chat, handle_history, handle_status, OutputFormat};
use eco_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the configured level; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("EcoAgent v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Ask { query } => {
            tracing::debug!("Answering query: {}", query);
            handle_ask(query, &config, format).await
        }

        Command::Chat => handle_chat(&config, format).await,

        Command::Status => handle_status(&config, format).await,

        Command::History { limit } => {
            tracing::debug!("Showing last {} log entries", limit);
            handle_history(limit, &config, format).await
        }
    }
}
