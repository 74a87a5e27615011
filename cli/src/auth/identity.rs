//! Signed-in identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The signed-in user as returned by the provider's code exchange.
///
/// The bearer credential travels under the provider's `apptoken` field name.
/// Unknown fields in provider responses (e.g. `admin`) are ignored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider username.
    pub username: String,
    /// Account email, when the provider shares it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Opaque bearer credential.
    #[serde(rename = "apptoken", alias = "token")]
    pub token: String,
}

impl Identity {
    /// Create an identity without an email.
    #[must_use]
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            token: token.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}
