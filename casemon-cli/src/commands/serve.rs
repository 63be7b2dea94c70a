//! HTTP server command
//!
//! Builds the pool eagerly (with bounded startup retry) and then serves the
//! ingestion, webhook, and health routes until Ctrl+C/SIGTERM.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use casemon_server::http::{run_server, ServerConfig};
use casemon_server::PoolManager;

use crate::config::load_app_config;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "CASEMON_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Per-request timeout in seconds
    #[arg(long, env = "CASEMON_REQUEST_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = load_app_config()?;

    tracing::info!(
        host = %config.db.host,
        port = config.db.port,
        database = %config.db.name,
        retry_window_s = config.db.startup_retry.window.as_secs(),
        "Connecting to database"
    );

    let pool = PoolManager::new(config.db.clone());
    pool.initialize()
        .await
        .context("Database unavailable at startup")?;

    let server_config = ServerConfig {
        bind_addr: args.bind,
        request_timeout: Duration::from_secs(args.timeout),
    };

    // Blocks until shutdown; the pool is closed on the way out
    run_server(pool, config.webhook_token, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
