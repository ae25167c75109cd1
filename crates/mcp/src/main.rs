//! Roombook MCP Server Binary
//!
//! ```bash
//! # Default database (sqlite://roombook.db)
//! roombook-mcp
//!
//! # Specific database and log level
//! ROOMBOOK_DATABASE_URL=sqlite://rooms.db ROOMBOOK_LOG_LEVEL=debug roombook-mcp
//! ```

use std::time::Duration;

use anyhow::Result;
use roombook_core::config::{AppConfig, LoadOptions, LogFormat};
use roombook_mcp::{bootstrap_with_config, spawn_session_sweeper, RoombookMcpServer, TOTAL_TOOLS};
use tracing::{info, Level};

/// Stdout carries the protocol, so logs go to stderr.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_max_level(log_level);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    let sweep_every = Duration::from_secs(app.config.sessions.sweep_interval_secs);
    let sweeper = spawn_session_sweeper(app.machine.clone(), sweep_every);
    info!(
        event_name = "system.mcp.started",
        tools = TOTAL_TOOLS,
        sweep_interval_secs = app.config.sessions.sweep_interval_secs,
        notification_mode = ?app.config.notifications.mode,
        "roombook MCP server ready"
    );

    let outcome = RoombookMcpServer::new(app.tools.clone()).run_stdio().await;
    sweeper.abort();
    app.db_pool.close().await;
    outcome
}
