//! Platform-specific path utilities for bloret.

use std::path::PathBuf;

use crate::error::{BloretError, Result};

/// Get the configuration directory for bloret.
///
/// - Linux: `~/.config/bloret`
/// - macOS: `~/Library/Application Support/bloret`
/// - Windows: `%APPDATA%\bloret`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| BloretError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("bloret"))
}

/// Get the data directory for bloret.
///
/// - Linux: `~/.local/share/bloret`
/// - macOS: `~/Library/Application Support/bloret`
/// - Windows: `%APPDATA%\bloret`
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| BloretError::Config("Cannot determine data directory".to_string()))?;
    Ok(base.join("bloret"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the identity file used by the file credential backend.
pub fn identity_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("identity.json"))
}
