//! Endpoint healthcheck binary

use anyhow::Context;
use clap::Parser;
use healthcheck::CancellationToken;
use healthcheck_cli::{Cli, Config, HealthcheckApp, OutputFormat, exit_code, shutdown_signal};
use validator::Validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Can't use tracing yet: the level comes from the file
    let mut config = Config::load_from_file(&cli.filepath)
        .with_context(|| format!("Failed to load {}", cli.filepath.display()))?;
    cli.apply(&mut config);
    config.validate().context("Invalid command line override")?;

    match config.logging.format {
        OutputFormat::Text => common::logging::init(&config.logging.level),
        OutputFormat::Json => common::logging::init_json(&config.logging.level),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoints = config.endpoints.len(),
        "Endpoint healthcheck starting"
    );

    let stop = CancellationToken::new();
    tokio::spawn(shutdown_signal(stop.clone()));

    if let Err(e) = HealthcheckApp::new(config).run(stop).await {
        tracing::error!(error = %e, fatal = e.is_fatal(), "Endpoint healthcheck failed");
        std::process::exit(exit_code(&e));
    }

    tracing::info!("Endpoint healthcheck stopped");
    Ok(())
}
