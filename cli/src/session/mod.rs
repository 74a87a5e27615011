//! The per-device session.
//!
//! A session owns the identity, the two-factor state and the poll timer,
//! and mutates them from a single task in message order. Network calls and
//! local verification run in spawned tasks whose completions are posted back
//! as messages, so a poll finishing and the user answering a request never
//! race.
//!
//! Presentation layers drive the session through a cloneable
//! [`SessionHandle`] and render the [`SessionView`] snapshots it publishes.

mod actor;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::auth::{CredentialStore, Identity};
use crate::biometric::BiometricGate;
use crate::config::TwoFactorConfig;
use crate::error::{BloretError, Result};
use crate::sync::{SyncChannel, SyncPayload, SyncRole, SyncTransport};
use crate::two_factor::{ApprovalAction, DecisionOutcome, PendingRequest, PollPhase, TwoFactorApi};

use actor::{Message, SessionActor};

/// Snapshot of everything a presentation layer shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Signed-in identity.
    pub identity: Option<Identity>,
    /// Poll engine phase.
    pub phase: PollPhase,
    /// The request awaiting the user's decision.
    pub presented: Option<PendingRequest>,
    /// User-facing error from the last decision, if it failed.
    pub message: Option<String>,
    /// What happened to the last decision.
    pub last_decision: Option<DecisionOutcome>,
    /// Poll cycles finished since the identity was set.
    pub polls_completed: u64,
}

/// Cloneable command side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Message>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    fn send(&self, message: Message) -> Result<()> {
        self.commands
            .send(message)
            .map_err(|_| BloretError::SessionClosed)
    }

    /// Adopts an identity obtained on this device.
    pub fn sign_in(&self, identity: Identity) -> Result<()> {
        self.send(Message::SignIn(identity))
    }

    /// Signs out on this device.
    pub fn sign_out(&self) -> Result<()> {
        self.send(Message::SignOut)
    }

    /// Delivers a context received from the paired device.
    pub fn context_received(&self, payload: SyncPayload) -> Result<()> {
        self.send(Message::ContextReceived(payload))
    }

    /// Reports that the link to the paired device came up.
    pub fn link_activated(&self) -> Result<()> {
        self.send(Message::LinkActivated)
    }

    /// Polls immediately instead of waiting for the next tick.
    pub fn poll_now(&self) -> Result<()> {
        self.send(Message::PollNow)
    }

    /// Answers a presented request.
    ///
    /// Answering a request that is no longer presented does nothing.
    pub fn respond(&self, request_id: impl Into<String>, action: ApprovalAction) -> Result<()> {
        self.send(Message::Respond {
            request_id: request_id.into(),
            action,
        })
    }

    /// Stops the session and its poll timer.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Message::Shutdown)
    }

    /// The latest snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver notified on every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Everything a session needs before it starts.
pub struct Session {
    store: CredentialStore,
    api: Arc<dyn TwoFactorApi>,
    gate: Arc<BiometricGate>,
    settings: TwoFactorConfig,
    sync: Option<(Arc<dyn SyncTransport>, SyncRole)>,
}

impl Session {
    /// Assembles a session without a paired device.
    #[must_use]
    pub fn new(
        store: CredentialStore,
        api: Arc<dyn TwoFactorApi>,
        gate: Arc<BiometricGate>,
        settings: TwoFactorConfig,
    ) -> Self {
        Self {
            store,
            api,
            gate,
            settings,
            sync: None,
        }
    }

    /// Keeps the identity in sync with a paired device over `transport`.
    ///
    /// `role` decides which end's identity wins when the link comes up.
    #[must_use]
    pub fn with_sync(mut self, transport: Arc<dyn SyncTransport>, role: SyncRole) -> Self {
        self.sync = Some((transport, role));
        self
    }

    /// Starts the session task.
    ///
    /// The persisted identity is loaded first; if there is one, polling
    /// starts right away.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(SessionView::default());

        let actor = SessionActor::new(
            self.store,
            self.api,
            self.gate,
            self.settings,
            self.sync
                .map(|(transport, role)| SyncChannel::spawn(transport, role)),
            commands.clone(),
            view_tx,
        );
        let task = tokio::spawn(actor.run(inbox));

        (SessionHandle { commands, view }, task)
    }
}
