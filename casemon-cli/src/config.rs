//! Environment loading for the casemon binary.
//!
//! Configuration is plain environment variables (see `casemon_core::config`).
//! `.env` files fill in whatever the process environment leaves unset:
//!
//! 1. `./.env` (current directory, highest priority)
//! 2. `~/.casemon/.env`
//!
//! dotenvy never overwrites variables that are already set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use casemon_core::AppConfig;
use tracing::{debug, info};

/// Get the casemon config directory path (~/.casemon)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".casemon"))
}

/// Load `.env` files into the process environment.
///
/// Runs before the subscriber exists (so `RUST_LOG` from a `.env` applies);
/// returns the files read so the caller can log them afterwards.
pub fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path);
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() && dotenvy::from_path(&env_file).is_ok() {
            loaded_from.push(env_file);
        }
    }

    loaded_from
}

/// Report which `.env` files were applied.
pub fn log_dotenv_sources(loaded_from: &[PathBuf]) {
    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.casemon)");
    } else {
        let files: Vec<_> = loaded_from.iter().map(|p| p.display().to_string()).collect();
        info!("Loaded configuration from: {}", files.join(", "));
    }
}

/// Read and validate the full service configuration.
pub fn load_app_config() -> Result<AppConfig> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    debug!(?config, "configuration loaded");
    Ok(config)
}
