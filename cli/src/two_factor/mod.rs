//! Two-factor login approval.
//!
//! This module provides the request model and the pure state behind the
//! poll engine and approval responder:
//! - [`PendingRequest`] / [`ApprovalAction`] - What the provider lists and what we answer
//! - [`TwoFactorState`] - Presented slot plus processed-request set
//! - [`TwoFactorApi`] - Provider operations (enables mocking)
//!
//! The timer, biometric gate and network calls are driven by
//! [`crate::session`].

pub mod model;
pub mod state;

pub use model::{ApprovalAction, DecisionOutcome, PendingRequest};
pub use state::{PollPhase, TwoFactorState};

use async_trait::async_trait;

use crate::auth::Identity;
use crate::error::Result;

/// Provider operations used by the poll engine and approval responder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TwoFactorApi: Send + Sync {
    /// Lists pending approval requests for the identity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the provider cannot be reached and a
    /// decode or provider error if the answer is unusable.
    async fn pending_requests(&self, identity: &Identity) -> Result<Vec<PendingRequest>>;

    /// Sends the user's decision for one request.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::Provider`](crate::error::BloretError::Provider)
    /// when the provider refuses the decision, or a transport error when the
    /// decision may not have arrived.
    async fn submit_decision(
        &self,
        identity: &Identity,
        request_id: &str,
        action: ApprovalAction,
    ) -> Result<()>;
}
