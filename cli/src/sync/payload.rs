//! Context payload exchanged between paired devices.

use serde_json::{Map, Value};

use crate::auth::Identity;
use crate::error::{BloretError, Result};

const IDENTITY_KEY: &str = "identity";

/// Identity or the explicit signed-out marker.
///
/// On the wire this is a context object whose `identity` key holds either
/// the identity or `null`. A context without the key carries nothing for
/// this client and is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPayload {
    /// Identity to adopt, or `None` to sign out.
    pub identity: Option<Identity>,
}

impl SyncPayload {
    /// Payload announcing a signed-in identity.
    #[must_use]
    pub const fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Payload announcing sign-out.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self { identity: None }
    }

    /// Encodes the payload as a context document.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be serialized.
    pub fn to_context(&self) -> Result<String> {
        let value = match &self.identity {
            Some(identity) => serde_json::to_value(identity)?,
            None => Value::Null,
        };
        let mut context = Map::new();
        context.insert(IDENTITY_KEY.to_string(), value);
        Ok(Value::Object(context).to_string())
    }

    /// Decodes a context document.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::Decode`] if the document is not an object with
    /// an `identity` key holding an identity or `null`.
    pub fn from_context(context: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(context).map_err(|e| BloretError::Decode(e.to_string()))?;
        let entry = value
            .get(IDENTITY_KEY)
            .ok_or_else(|| BloretError::Decode("context has no identity entry".to_string()))?;

        if entry.is_null() {
            return Ok(Self::signed_out());
        }

        let identity = serde_json::from_value(entry.clone())
            .map_err(|e| BloretError::Decode(e.to_string()))?;
        Ok(Self::signed_in(identity))
    }
}

impl From<Option<Identity>> for SyncPayload {
    fn from(identity: Option<Identity>) -> Self {
        Self { identity }
    }
}
