//! Barkle GPS - appointment stop-list route planner
//!
//! Keeps a persisted list of appointment addresses, orders it through a
//! routing service and hands the result to a navigation app.

mod app;
mod cli;
mod config;
mod defaults;
mod error;
mod services;
mod types;

use anyhow::Result;
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::app::StdinInput;
use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "barkle-gps.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Terminal output belongs to the planner, so only warnings reach stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,barkle_gps=debug".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!("Starting Barkle GPS {}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let planner = app::build_planner(&config).await?;
    let status = planner.refresh_location().await;
    info!("Start location status: {}", status.as_str());

    let command = cli.command.unwrap_or(Command::Shell);
    if command == Command::Shell {
        return app::run_shell(&planner).await;
    }

    match app::execute(&planner, &command, &mut StdinInput::new()).await {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            info!("{:?} failed: {}", command, e);
            eprintln!("{}", e.user_message());
            drop(guard);
            std::process::exit(1);
        }
    }
}
