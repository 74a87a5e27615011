//! Configuration management for bloret.

pub mod paths;
pub mod settings;

pub use paths::config_file;
pub use settings::{
    ApiConfig, BiometricConfig, BloretConfig, CredentialBackend, CredentialsConfig,
    TwoFactorConfig,
};

use std::path::Path;

use crate::error::{BloretError, Result};

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<BloretConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<BloretConfig> {
    if !path.exists() {
        return Ok(BloretConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: BloretConfig =
        toml::from_str(&contents).map_err(|e| BloretError::ConfigRead(e.to_string()))?;

    Ok(config.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.api.app_id, "BloretApp");
    }

    #[test]
    fn reads_biometric_commands() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[biometric]\nstrong_command = \"fprintd-verify\"\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(
            config.biometric.strong_command.as_deref(),
            Some("fprintd-verify")
        );
        assert!(config.biometric.fallback_command.is_none());
    }

    #[test]
    fn malformed_file_is_a_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[two_factor\npoll_interval_secs = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, BloretError::ConfigRead(_)));
    }
}
