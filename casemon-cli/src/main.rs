//! casemon - transaction event and Grafana alert ingestion service
//!
//! Entry point for the `casemon` binary:
//! - `serve`: run the HTTP API (ingestion, webhook, health)
//! - `check`: verify configuration and database connectivity, then exit

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "casemon",
    author,
    version,
    about = "Transaction event and Grafana alert ingestion service",
    long_about = "Ingest transaction events and Grafana alert webhooks into PostgreSQL through \
                  a bounded connection pool that survives database restarts."
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Check configuration and database connectivity
    Check(commands::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv_files = config::load_dotenv();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();
    config::log_dotenv_sources(&dotenv_files);

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::Check(args) => commands::run_check(args).await,
    };

    tracing_setup::shutdown_otel();
    result
}
