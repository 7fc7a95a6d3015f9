//! Application entry point
//!
//! CLI parsing, logging setup, and the server run loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use crate::bridge::{DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_GODOT_URL, GodotConnection};
use crate::mcp::start_mcp_server;

#[derive(Parser)]
#[command(name = "godot-mcp", about = "MCP server for the Godot editor")]
struct Cli {
    /// WebSocket address of the Godot editor plugin
    #[arg(long, default_value = DEFAULT_GODOT_URL)]
    godot_url: String,

    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_MS)]
    timeout_ms: u64,
}

/// Parse the CLI, start the server, and run until Ctrl-C
pub fn launch() {
    if let Err(e) = run() {
        eprintln!("godot-mcp: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let url = Url::parse(&cli.godot_url).context("invalid Godot WebSocket address")?;
    anyhow::ensure!(
        matches!(url.scheme(), "ws" | "wss"),
        "Godot address must use ws:// or wss://"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async {
        let connection = Arc::new(GodotConnection::new(
            cli.godot_url,
            Duration::from_millis(cli.timeout_ms),
        ));

        let port = start_mcp_server(Arc::clone(&connection))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!("MCP server listening on http://127.0.0.1:{port}/mcp");

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        connection.disconnect();

        Ok(())
    })
}
