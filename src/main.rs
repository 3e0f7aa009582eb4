//! Relay Bot - Main Entry Point
//!
//! Reads owner commands line by line from standard input and runs the
//! resulting send tasks until Ctrl+C or end of input.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use relay_bot::commands::CommandHandler;
use relay_bot::config::BotSettings;
use relay_bot::driver::OutboxDriverFactory;
use relay_bot::tasks::{ResourceManager, TaskRegistry};

/// Chat-controlled message relay.
#[derive(Parser, Debug)]
#[command(name = "relay_bot")]
#[command(about = "Run pausable message send tasks driven by owner commands")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for delivered messages (overrides `OUTBOX_DIR`).
    #[arg(long)]
    outbox_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings =
        BotSettings::from_env().context("Failed to load bot settings from environment")?;
    if let Some(dir) = args.outbox_dir {
        settings.outbox_dir = dir;
    }

    std::fs::create_dir_all(&settings.sessions_dir).with_context(|| {
        format!(
            "Failed to create sessions directory {}",
            settings.sessions_dir.display()
        )
    })?;

    let factory = Arc::new(OutboxDriverFactory::new(settings.outbox_dir.clone()));
    let registry = Arc::new(TaskRegistry::new(ResourceManager::new(factory)));
    let handler = CommandHandler::new(&settings, Arc::clone(&registry));

    info!("Relay bot started");
    info!("Command prefix: {}", settings.command_prefix);
    info!("Outbox directory: {}", settings.outbox_dir.display());
    info!("Type commands below. Use Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match handler.try_handle(settings.owner_id, &line).await {
                        Some(result) => println!("{}", result.message),
                        None => println!("Unknown command. Use {}help", settings.command_prefix),
                    }
                }
                Ok(None) => {
                    info!("End of input, shutting down...");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read command: {}", e);
                    break;
                }
            },
        }
    }

    // Cleanup
    let reports = registry.shutdown().await;
    for report in &reports {
        info!(
            "Task {} {}: {}/{} sent",
            report.id, report.status, report.cursor, report.total_steps
        );
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
