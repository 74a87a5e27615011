//! Presented-request slot and de-duplication set.
//!
//! [`TwoFactorState`] holds no I/O. The session actor feeds it poll results
//! and user decisions in order, which keeps the invariants checkable in
//! isolation:
//! - at most one request is presented
//! - a processed request id is never presented while it stays processed

use std::collections::HashSet;

use crate::two_factor::model::PendingRequest;

/// Where the poll engine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// No identity; no timer.
    #[default]
    Idle,
    /// Timer running, nothing presented.
    Polling,
    /// Timer running, one request presented.
    Presenting,
}

/// Presented slot plus the process-lifetime processed set.
#[derive(Debug, Default)]
pub struct TwoFactorState {
    presented: Option<PendingRequest>,
    processed: HashSet<String>,
}

impl TwoFactorState {
    /// The request currently shown to the user.
    #[must_use]
    pub const fn presented(&self) -> Option<&PendingRequest> {
        self.presented.as_ref()
    }

    /// Whether a request id has already been acted upon.
    #[must_use]
    pub fn is_processed(&self, request_id: &str) -> bool {
        self.processed.contains(request_id)
    }

    /// Phase for the given sign-in state.
    #[must_use]
    pub const fn phase(&self, signed_in: bool) -> PollPhase {
        match (signed_in, self.presented.is_some()) {
            (false, _) => PollPhase::Idle,
            (true, false) => PollPhase::Polling,
            (true, true) => PollPhase::Presenting,
        }
    }

    /// Apply one poll result.
    ///
    /// Only the first listed request is considered. It is presented when the
    /// slot is empty and its id is not processed. Returns the newly
    /// presented request, if any.
    pub fn apply_poll(&mut self, requests: Vec<PendingRequest>) -> Option<&PendingRequest> {
        let first = requests.into_iter().next()?;
        if self.presented.is_some() || self.processed.contains(&first.request_id) {
            return None;
        }
        self.presented = Some(first);
        self.presented.as_ref()
    }

    /// Take the presented request for answering.
    ///
    /// Marks the id processed and empties the slot. Returns `None`, changing
    /// nothing, when `request_id` is not the presented request.
    pub fn claim(&mut self, request_id: &str) -> Option<PendingRequest> {
        if self.presented.as_ref()?.request_id != request_id {
            return None;
        }
        let request = self.presented.take()?;
        self.processed.insert(request.request_id.clone());
        Some(request)
    }

    /// Make a processed id eligible for presentation again.
    pub fn release(&mut self, request_id: &str) -> bool {
        self.processed.remove(request_id)
    }

    /// Drop the presented request without marking it processed.
    pub fn discard_presented(&mut self) -> Option<PendingRequest> {
        self.presented.take()
    }
}
