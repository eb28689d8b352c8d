// ABOUTME: Entry point for the sqlweb command-line client
// ABOUTME: Loads the active profile, builds the pool, and runs one command

use anyhow::Context;
use sqlweb_lib::cli::{self, Command};
use sqlweb_lib::config::AppConfig;
use sqlweb_lib::SqlServerOperation;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let config = AppConfig::load().context("Failed to load config")?;
    let profile = config
        .resolved_profile()
        .context("No active connection profile configured")?;

    tracing::info!(profile = %profile.name, host = %profile.host, "Using connection profile");

    let operation = SqlServerOperation::connect(&profile, &config.pool)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", profile.host, profile.port))?;

    let response = cli::execute(&operation, command).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response["success"] != serde_json::Value::Bool(true) {
        std::process::exit(1);
    }
    Ok(())
}
