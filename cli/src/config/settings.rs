//! Application configuration settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Main configuration for bloret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BloretConfig {
    /// Identity provider API settings.
    pub api: ApiConfig,
    /// Two-factor polling and approval behaviour.
    pub two_factor: TwoFactorConfig,
    /// Local verification commands.
    pub biometric: BiometricConfig,
    /// Where the signed-in identity is persisted.
    pub credentials: CredentialsConfig,
}

/// Identity provider API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Provider base URL.
    #[serde(with = "url_serde")]
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// OAuth application identifier sent with every request.
    pub app_id: String,
    /// OAuth application secret used for the code exchange.
    pub app_secret: String,
    /// Redirect URI registered for the OAuth application.
    pub redirect_uri: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://pcfs.eno.ink:20000").expect("valid default URL"),
            timeout_secs: 10,
            app_id: "BloretApp".to_string(),
            app_secret: "caFzuv-havqe3-hipcug".to_string(),
            redirect_uri: "http://localhost:17248/login/BloretPassPort".to_string(),
        }
    }
}

impl ApiConfig {
    /// Resolves a provider path against the base URL.
    ///
    /// A path prefix in the base URL is kept: with a base of
    /// `https://host/bloret` the path `/app/verify` resolves to
    /// `https://host/bloret/app/verify`.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let prefix = format!("{}/", base.path());
            base.set_path(&prefix);
        }
        base.join(path.trim_start_matches('/'))
    }
}

/// Two-factor poll engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoFactorConfig {
    /// Seconds between pending-request queries.
    pub poll_interval_secs: u64,
    /// Skip a tick while the previous query is still outstanding.
    pub skip_overlapping_polls: bool,
    /// Let a request whose approval failed local verification be shown again.
    pub reprompt_after_gate_failure: bool,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            skip_overlapping_polls: true,
            reprompt_after_gate_failure: false,
        }
    }
}

impl TwoFactorConfig {
    /// Poll interval, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Local verification commands. Exit status 0 means verified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    /// Strong check, e.g. `fprintd-verify`.
    pub strong_command: Option<String>,
    /// Passcode-equivalent check tried when the strong one fails.
    pub fallback_command: Option<String>,
}

/// Credential persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Storage backend for the signed-in identity.
    pub backend: CredentialBackend,
}

/// Available credential storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keyring.
    #[default]
    Keyring,
    /// JSON file in the data directory.
    File,
    /// Process memory only.
    Memory,
}

impl TryFrom<&str> for CredentialBackend {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown credential backend: {s}")),
        }
    }
}

/// Custom serde module for URL serialization.
mod url_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S>(url: &Url, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(url.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const API_URL: &str = "BLORET_API_URL";
    pub const POLL_INTERVAL: &str = "BLORET_POLL_INTERVAL";
    pub const CREDENTIALS_BACKEND: &str = "BLORET_CREDENTIALS_BACKEND";
    pub const LOG_LEVEL: &str = "BLORET_LOG";
}

impl BloretConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(env::API_URL) {
            if let Ok(parsed) = Url::parse(&url) {
                self.api.base_url = parsed;
            }
        }

        if let Ok(secs) = std::env::var(env::POLL_INTERVAL) {
            if let Ok(secs) = secs.parse() {
                self.two_factor.poll_interval_secs = secs;
            }
        }

        if let Ok(backend) = std::env::var(env::CREDENTIALS_BACKEND) {
            if let Ok(b) = backend.as_str().try_into() {
                self.credentials.backend = b;
            }
        }

        self
    }
}
