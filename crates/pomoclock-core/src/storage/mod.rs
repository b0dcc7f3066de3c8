mod config;
pub mod database;
pub mod kv;
pub mod prefs;

pub use config::AppConfig;
pub use database::Database;
pub use kv::{KvStore, MemoryStore};
pub use prefs::Preferences;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `POMOCLOCK_DATA_DIR` wins when set. Otherwise this is
/// `~/.config/pomoclock[-dev]/`, with the `-dev` suffix selected by
/// `POMOCLOCK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("POMOCLOCK_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("POMOCLOCK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("pomoclock-dev")
            } else {
                base_dir.join("pomoclock")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
