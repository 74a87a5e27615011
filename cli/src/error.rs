//! Error types and result aliases for bloret.
//!
//! This module provides the error taxonomy shared by every component:
//! - Transport failures (network, timeout, unavailable server) that a caller
//!   may retry
//! - Decode failures for malformed provider responses
//! - Structured provider failures that are final for the request they answer
//! - Local storage, configuration and device-link failures

use thiserror::Error;

/// Main error type for bloret operations.
///
/// Use [`is_transport`](Self::is_transport) to decide whether a failed
/// request may be retried and [`requires_reauth`](Self::requires_reauth) to
/// decide when the user has to sign in again.
#[derive(Error, Debug)]
pub enum BloretError {
    /// No identity is stored for this device.
    #[error("Not signed in. Run 'bloret auth login' to sign in.")]
    NotAuthenticated,

    /// The OAuth code exchange was refused or produced no identity.
    #[error("Sign-in failed: {0}")]
    AuthenticationFailed(String),

    /// Stored identity is malformed or corrupted.
    #[error("Stored identity is invalid. Run 'bloret auth logout' then 'bloret auth login'.")]
    InvalidCredentials,

    /// The identity provider answered with a structured failure.
    #[error("Bloret rejected the request: {0}")]
    Provider(String),

    /// API returned a non-success status code without a structured body.
    #[error("API request failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// API returned 401 Unauthorized.
    #[error("Bloret returned unauthorized (401). Your session may have expired. Run 'bloret auth login' to sign in again.")]
    Unauthorized,

    /// API server is unreachable (502/503/504 or connection failed).
    #[error("Bloret server is unavailable. Check your network connection or try again later.")]
    ApiUnavailable,

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable.")]
    Timeout,

    /// Network error during HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// A provider response could not be decoded.
    #[error("Unexpected response from Bloret: {0}")]
    Decode(String),

    /// The companion device link is not active.
    #[error("Companion device link is not active.")]
    LinkInactive,

    /// The session actor has stopped and no longer accepts commands.
    #[error("Session has shut down.")]
    SessionClosed,

    /// Failed to access the credential backend.
    #[error("Failed to access credential storage: {0}. Ensure your system keyring is unlocked.")]
    CredentialStorage(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON or TOML serialization/deserialization failed.
    #[error("Data serialization error: {0}. This may indicate corrupted data.")]
    Serialization(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl BloretError {
    /// Checks if this error can be resolved by signing in again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::InvalidCredentials | Self::Unauthorized
        )
    }

    /// Checks if the request never got a usable answer from the provider.
    ///
    /// Transport failures leave the provider-side state unknown, so the
    /// operation may be attempted again. Server-side 5xx responses without
    /// a structured body count as transport failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::ApiUnavailable => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using [`BloretError`].
pub type Result<T> = std::result::Result<T, BloretError>;

impl From<serde_json::Error> for BloretError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for BloretError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}

impl From<keyring::Error> for BloretError {
    fn from(err: keyring::Error) -> Self {
        Self::CredentialStorage(err.to_string())
    }
}

impl From<reqwest::Error> for BloretError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ApiUnavailable
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for BloretError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}
