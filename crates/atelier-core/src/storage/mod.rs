pub mod block_db;
pub mod config;
pub mod migrations;

pub use block_db::BlockDb;
pub use config::EngineConfig;

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/atelier[-dev]/` based on ATELIER_ENV.
///
/// Set ATELIER_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the config directory cannot be created.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ATELIER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("atelier-dev")
    } else {
        base_dir.join("atelier")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
