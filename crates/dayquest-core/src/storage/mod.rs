mod config;
mod kv;
mod local;

pub use config::{Config, EnergyConfig, SyncConfig, TimingConfig};
pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use local::LocalPersistence;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `DAYQUEST_HOME` overrides the location entirely. Otherwise the directory
/// is `~/.config/dayquest[-dev]/`, with the `-dev` suffix selected by
/// `DAYQUEST_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DAYQUEST_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DAYQUEST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dayquest-dev")
            } else {
                base_dir.join("dayquest")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
