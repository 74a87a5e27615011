//! Two-factor request and decision types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A login-approval request waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Provider-assigned request identifier.
    #[serde(alias = "requestId", alias = "id")]
    pub request_id: String,
    /// Address the sign-in attempt came from.
    #[serde(rename = "ip", alias = "sourceIp", alias = "source_ip", default)]
    pub source_ip: String,
    /// Description of the device attempting to sign in.
    #[serde(
        rename = "device",
        alias = "deviceDescription",
        alias = "device_description",
        default
    )]
    pub device_description: String,
    /// When this client first saw the request.
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl PendingRequest {
    /// Create a request received now.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        source_ip: impl Into<String>,
        device_description: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            source_ip: source_ip.into(),
            device_description: device_description.into(),
            received_at: Utc::now(),
        }
    }
}

/// The user's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalAction {
    /// Let the sign-in proceed. Requires local verification.
    #[serde(rename = "approve")]
    Allow,
    /// Refuse the sign-in.
    #[serde(rename = "reject")]
    Deny,
}

impl ApprovalAction {
    /// Value sent to the provider.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Allow => "approve",
            Self::Deny => "reject",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// What happened to the last decision the user made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The provider accepted the decision.
    Sent {
        request_id: String,
        action: ApprovalAction,
    },
    /// Local verification failed; nothing was sent.
    VerificationFailed { request_id: String },
    /// Sending failed. `retry` tells whether the request may be shown again.
    Failed { request_id: String, retry: bool },
}
