//! The session task and its messages.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::auth::{ChangeOrigin, CredentialStore, Identity, IdentityChange};
use crate::biometric::BiometricGate;
use crate::config::TwoFactorConfig;
use crate::error::Result;
use crate::session::SessionView;
use crate::sync::{SyncChannel, SyncPayload};
use crate::two_factor::{
    ApprovalAction, DecisionOutcome, PendingRequest, TwoFactorApi, TwoFactorState,
};

/// Commands from handles plus completions from spawned work.
pub(super) enum Message {
    SignIn(Identity),
    SignOut,
    ContextReceived(SyncPayload),
    LinkActivated,
    PollNow,
    Respond {
        request_id: String,
        action: ApprovalAction,
    },
    Shutdown,
    Tick {
        generation: u64,
    },
    PollFinished {
        generation: u64,
        username: String,
        result: Result<Vec<PendingRequest>>,
    },
    VerificationFinished {
        username: String,
        request: PendingRequest,
        passed: bool,
    },
    DecisionFinished {
        username: String,
        request_id: String,
        action: ApprovalAction,
        result: Result<()>,
    },
}

pub(super) struct SessionActor {
    store: CredentialStore,
    state: TwoFactorState,
    api: Arc<dyn TwoFactorApi>,
    gate: Arc<BiometricGate>,
    settings: TwoFactorConfig,
    sync: Option<SyncChannel>,
    mailbox: mpsc::UnboundedSender<Message>,
    view: watch::Sender<SessionView>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever an identity lifetime starts or ends; tags ticks and polls.
    generation: u64,
    poll_in_flight: bool,
    polls_completed: u64,
    message: Option<String>,
    last_decision: Option<DecisionOutcome>,
}

impl SessionActor {
    pub(super) fn new(
        store: CredentialStore,
        api: Arc<dyn TwoFactorApi>,
        gate: Arc<BiometricGate>,
        settings: TwoFactorConfig,
        sync: Option<SyncChannel>,
        mailbox: mpsc::UnboundedSender<Message>,
        view: watch::Sender<SessionView>,
    ) -> Self {
        Self {
            store,
            state: TwoFactorState::default(),
            api,
            gate,
            settings,
            sync,
            mailbox,
            view,
            timer: None,
            generation: 0,
            poll_in_flight: false,
            polls_completed: 0,
            message: None,
            last_decision: None,
        }
    }

    pub(super) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        if let Some(identity) = self.store.load() {
            info!(username = %identity.username, "restored identity");
            let change = IdentityChange {
                identity: Some(identity),
                origin: ChangeOrigin::Local,
            };
            self.identity_changed(&change, true);
        }
        self.publish();

        while let Some(message) = inbox.recv().await {
            if matches!(message, Message::Shutdown) {
                break;
            }
            self.handle(message);
            self.publish();
        }

        self.stop_timer();
        debug!("session stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::SignIn(identity) => self.save_identity(identity, ChangeOrigin::Local),
            Message::SignOut => self.clear_identity(ChangeOrigin::Local),
            Message::ContextReceived(payload) => match payload.identity {
                Some(identity) => self.save_identity(identity, ChangeOrigin::Remote),
                None => self.clear_identity(ChangeOrigin::Remote),
            },
            Message::LinkActivated => {
                if let Some(sync) = &self.sync {
                    sync.on_link_activated(self.store.current());
                }
            }
            Message::PollNow => self.poll(),
            Message::Respond { request_id, action } => self.respond(&request_id, action),
            Message::Tick { generation } => {
                if generation == self.generation {
                    self.poll();
                }
            }
            Message::PollFinished {
                generation,
                username,
                result,
            } => self.poll_finished(generation, &username, result),
            Message::VerificationFinished {
                username,
                request,
                passed,
            } => self.verification_finished(&username, request, passed),
            Message::DecisionFinished {
                username,
                request_id,
                action,
                result,
            } => self.decision_finished(&username, request_id, action, result),
            Message::Shutdown => {}
        }
    }

    fn publish(&self) {
        let next = SessionView {
            identity: self.store.current().cloned(),
            phase: self.state.phase(self.store.current().is_some()),
            presented: self.state.presented().cloned(),
            message: self.message.clone(),
            last_decision: self.last_decision.clone(),
            polls_completed: self.polls_completed,
        };
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn is_current_user(&self, username: &str) -> bool {
        self.store
            .current()
            .is_some_and(|identity| identity.username == username)
    }

    fn save_identity(&mut self, identity: Identity, origin: ChangeOrigin) {
        let unchanged = self.store.current() == Some(&identity);
        if unchanged && origin == ChangeOrigin::Remote {
            debug!("received identity is already current");
            return;
        }
        let change = self.store.save(identity, origin);
        self.identity_changed(&change, !unchanged);
    }

    fn clear_identity(&mut self, origin: ChangeOrigin) {
        if self.store.current().is_none() && origin == ChangeOrigin::Remote {
            debug!("received sign-out while already signed out");
            return;
        }
        let change = self.store.clear(origin);
        self.identity_changed(&change, true);
    }

    fn identity_changed(&mut self, change: &IdentityChange, restart: bool) {
        if let Some(sync) = &self.sync {
            sync.on_identity_change(change);
        }

        match &change.identity {
            Some(_) if restart || self.timer.is_none() => self.start_polling(),
            Some(_) => {}
            None => self.stop_polling(),
        }
    }

    fn start_polling(&mut self) {
        self.end_identity_lifetime();

        let generation = self.generation;
        let period = self.settings.poll_interval();
        let mailbox = self.mailbox.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if mailbox.send(Message::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
        debug!(?period, generation, "poll timer started");
    }

    fn stop_polling(&mut self) {
        self.end_identity_lifetime();
        debug!("poll timer stopped");
    }

    /// Cancels the timer and forgets everything tied to the previous identity.
    ///
    /// The presented request is dropped, not processed: it is shown again if
    /// the provider still lists it once polling resumes.
    fn end_identity_lifetime(&mut self) {
        self.stop_timer();
        self.generation += 1;
        self.poll_in_flight = false;
        self.polls_completed = 0;
        self.message = None;
        self.last_decision = None;
        if let Some(request) = self.state.discard_presented() {
            info!(request_id = %request.request_id, "discarded presented request");
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn poll(&mut self) {
        let Some(identity) = self.store.current().cloned() else {
            return;
        };
        if self.poll_in_flight && self.settings.skip_overlapping_polls {
            debug!("previous poll still outstanding; skipping tick");
            return;
        }
        self.poll_in_flight = true;

        let api = Arc::clone(&self.api);
        let mailbox = self.mailbox.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = api.pending_requests(&identity).await;
            let _ = mailbox.send(Message::PollFinished {
                generation,
                username: identity.username,
                result,
            });
        });
    }

    fn poll_finished(
        &mut self,
        generation: u64,
        username: &str,
        result: Result<Vec<PendingRequest>>,
    ) {
        if generation != self.generation || !self.is_current_user(username) {
            debug!(%username, "discarding poll result from a previous identity");
            return;
        }
        self.poll_in_flight = false;
        self.polls_completed += 1;

        match result {
            Ok(requests) => {
                if let Some(request) = self.state.apply_poll(requests) {
                    info!(
                        request_id = %request.request_id,
                        ip = %request.source_ip,
                        device = %request.device_description,
                        "login approval requested"
                    );
                }
            }
            Err(e) if e.requires_reauth() => {
                warn!(error = %e, "provider refused the stored identity; sign in again");
            }
            Err(e) => debug!(error = %e, "poll failed; retrying on next tick"),
        }
    }

    fn respond(&mut self, request_id: &str, action: ApprovalAction) {
        let Some(identity) = self.store.current().cloned() else {
            debug!(%request_id, "not signed in; ignoring response");
            return;
        };
        let Some(request) = self.state.claim(request_id) else {
            if self.state.is_processed(request_id) {
                debug!(%request_id, "request already answered");
            } else {
                debug!(%request_id, "request is not presented; ignoring response");
            }
            return;
        };
        info!(%request_id, %action, "answering login request");

        match action {
            ApprovalAction::Deny => self.send_decision(identity, request.request_id, action),
            ApprovalAction::Allow => {
                let gate = Arc::clone(&self.gate);
                let mailbox = self.mailbox.clone();
                let reason = format!(
                    "Approve Bloret sign-in from {} ({})",
                    request.source_ip, request.device_description
                );
                tokio::spawn(async move {
                    let passed = gate.authenticate(&reason).await;
                    let _ = mailbox.send(Message::VerificationFinished {
                        username: identity.username,
                        request,
                        passed,
                    });
                });
            }
        }
    }

    fn verification_finished(&mut self, username: &str, request: PendingRequest, passed: bool) {
        if !passed {
            info!(request_id = %request.request_id, "local verification failed; approval not sent");
            if self.settings.reprompt_after_gate_failure && self.is_current_user(username) {
                self.state.release(&request.request_id);
            }
            self.last_decision = Some(DecisionOutcome::VerificationFailed {
                request_id: request.request_id,
            });
            return;
        }

        let identity = self
            .store
            .current()
            .filter(|identity| identity.username == username)
            .cloned();
        match identity {
            Some(identity) => {
                self.send_decision(identity, request.request_id, ApprovalAction::Allow);
            }
            None => debug!(%username, "identity changed during verification; approval dropped"),
        }
    }

    fn send_decision(&self, identity: Identity, request_id: String, action: ApprovalAction) {
        let api = Arc::clone(&self.api);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = api.submit_decision(&identity, &request_id, action).await;
            let _ = mailbox.send(Message::DecisionFinished {
                username: identity.username,
                request_id,
                action,
                result,
            });
        });
    }

    fn decision_finished(
        &mut self,
        username: &str,
        request_id: String,
        action: ApprovalAction,
        result: Result<()>,
    ) {
        if !self.is_current_user(username) {
            debug!(%username, %request_id, "identity changed; ignoring decision result");
            return;
        }

        match result {
            Ok(()) => {
                info!(%request_id, %action, "decision accepted");
                self.message = None;
                self.last_decision = Some(DecisionOutcome::Sent { request_id, action });
            }
            Err(e) => {
                let retry = e.is_transport();
                warn!(error = %e, %request_id, retry, "decision not delivered");
                if retry {
                    self.state.release(&request_id);
                }
                self.message = Some(e.to_string());
                self.last_decision = Some(DecisionOutcome::Failed { request_id, retry });
            }
        }
    }
}

impl Drop for SessionActor {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
