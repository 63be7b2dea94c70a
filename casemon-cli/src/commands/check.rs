//! Connectivity check command
//!
//! Loads configuration, builds the pool, and runs one leased `SELECT 1`.
//! Exits non-zero with the underlying error when any step fails.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use casemon_server::db::{LeaseGuard, ManagedConnection};
use casemon_server::PoolManager;

use crate::config::load_app_config;

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Override DB_STARTUP_RETRY_SECONDS for this check (0 = single attempt)
    #[arg(long)]
    pub retry_seconds: Option<u64>,
}

/// Verify configuration and database reachability
pub async fn run_check(args: CheckArgs) -> Result<()> {
    let mut config = load_app_config()?;
    if let Some(secs) = args.retry_seconds {
        config.db.startup_retry.window = Duration::from_secs(secs);
    }

    let pool = PoolManager::new(config.db.clone());
    pool.initialize().await.context("Database not reachable")?;

    let probe = LeaseGuard::new(pool.clone())
        .with_connection(|conn| conn.ping())
        .await
        .context("Health probe failed");
    pool.shutdown().await;
    probe?;

    println!(
        "database: ok ({}@{}:{}/{})",
        config.db.user, config.db.host, config.db.port, config.db.name
    );
    println!(
        "pool: min {} / max {}, statement timeout {}ms",
        config.db.pool_min,
        config.db.pool_max,
        config.db.statement_timeout.as_millis()
    );
    match config.webhook_token {
        Some(_) => println!("webhook token: configured"),
        None => println!("webhook token: not set (all webhook deliveries will be rejected)"),
    }

    Ok(())
}
