use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::*;
use crate::auth::{MemoryStore, SecretStore};
use crate::biometric::{CommandVerifier, MockVerifier};
use crate::error::BloretError;
use crate::sync::testing::RecordingTransport;
use crate::sync::{paired, spawn_forwarder, LinkEnd, PairedLink, SyncRole};

const TICK: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum Failure {
    Transport,
    Decode,
    Provider,
}

impl Failure {
    fn error(self) -> BloretError {
        match self {
            Self::Transport => BloretError::Network("connection reset".to_string()),
            Self::Decode => BloretError::Decode("expected value at line 1".to_string()),
            Self::Provider => BloretError::Provider("request expired".to_string()),
        }
    }
}

/// Provider fake whose answers the test changes between ticks.
#[derive(Default)]
struct ScriptedApi {
    listed: Mutex<Vec<PendingRequest>>,
    poll_failure: Mutex<Option<Failure>>,
    decision_failure: Mutex<Option<Failure>>,
    hold: Mutex<Option<Arc<Semaphore>>>,
    polls: AtomicUsize,
    decisions: Mutex<Vec<(String, ApprovalAction)>>,
}

impl ScriptedApi {
    fn list(&self, ids: &[&str]) {
        *self.listed.lock().unwrap() = ids.iter().map(|id| request(id)).collect();
    }

    fn fail_polls(&self, failure: Option<Failure>) {
        *self.poll_failure.lock().unwrap() = failure;
    }

    fn fail_decisions(&self, failure: Option<Failure>) {
        *self.decision_failure.lock().unwrap() = failure;
    }

    /// Polls block until the returned semaphore is given permits.
    fn hold_polls(&self) -> Arc<Semaphore> {
        let hold = Arc::new(Semaphore::new(0));
        *self.hold.lock().unwrap() = Some(Arc::clone(&hold));
        hold
    }

    fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn decisions(&self) -> Vec<(String, ApprovalAction)> {
        self.decisions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TwoFactorApi for ScriptedApi {
    async fn pending_requests(&self, _identity: &Identity) -> Result<Vec<PendingRequest>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            hold.acquire().await.unwrap().forget();
        }
        if let Some(failure) = *self.poll_failure.lock().unwrap() {
            return Err(failure.error());
        }
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn submit_decision(
        &self,
        _identity: &Identity,
        request_id: &str,
        action: ApprovalAction,
    ) -> Result<()> {
        self.decisions
            .lock()
            .unwrap()
            .push((request_id.to_string(), action));
        match *self.decision_failure.lock().unwrap() {
            Some(failure) => Err(failure.error()),
            None => Ok(()),
        }
    }
}

fn request(id: &str) -> PendingRequest {
    PendingRequest::new(id, "203.0.113.7", "Windows / HMCL")
}

fn alice() -> Identity {
    Identity::new("alice", "token-a")
}

fn bob() -> Identity {
    Identity::new("bob", "token-b")
}

/// No verifier available on the host, so approvals are permitted.
fn permissive_gate() -> BiometricGate {
    BiometricGate::new(
        Box::new(CommandVerifier::new(None)),
        Box::new(CommandVerifier::new(None)),
    )
}

fn denying_gate() -> BiometricGate {
    let mut strong = MockVerifier::new();
    strong.expect_is_available().return_const(true);
    strong.expect_verify().returning(|_| Ok(false));
    let mut fallback = MockVerifier::new();
    fallback.expect_is_available().return_const(false);
    BiometricGate::new(Box::new(strong), Box::new(fallback))
}

fn session(api: &Arc<ScriptedApi>, gate: BiometricGate, settings: TwoFactorConfig) -> Session {
    session_over(MemoryStore::default(), api, gate, settings)
}

fn session_over(
    backend: MemoryStore,
    api: &Arc<ScriptedApi>,
    gate: BiometricGate,
    settings: TwoFactorConfig,
) -> Session {
    Session::new(
        CredentialStore::new(Box::new(backend)),
        Arc::clone(api) as Arc<dyn TwoFactorApi>,
        Arc::new(gate),
        settings,
    )
}

fn start(api: &Arc<ScriptedApi>) -> SessionHandle {
    session(api, permissive_gate(), TwoFactorConfig::default())
        .spawn()
        .0
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn next_tick() {
    tokio::time::sleep(TICK).await;
    settle().await;
}

fn presented_id(handle: &SessionHandle) -> Option<String> {
    handle.view().presented.map(|request| request.request_id)
}

/// Signs in as alice with `ids` listed and waits for the first poll.
async fn signed_in_with(api: &Arc<ScriptedApi>, handle: &SessionHandle, ids: &[&str]) {
    api.list(ids);
    handle.sign_in(alice()).unwrap();
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn first_listed_request_stays_presented_until_resolved() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);

    signed_in_with(&api, &handle, &["r1"]).await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
    assert_eq!(handle.view().phase, PollPhase::Presenting);

    api.list(&["r1", "r2"]);
    next_tick().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));

    api.list(&["r2", "r1"]);
    next_tick().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
    assert_eq!(api.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn denied_request_is_sent_and_never_presented_again() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;

    assert_eq!(api.decisions(), vec![("r1".to_string(), ApprovalAction::Deny)]);
    let view = handle.view();
    assert_eq!(view.presented, None);
    assert_eq!(view.message, None);
    assert_eq!(
        view.last_decision,
        Some(DecisionOutcome::Sent {
            request_id: "r1".to_string(),
            action: ApprovalAction::Deny,
        })
    );

    next_tick().await;
    assert_eq!(presented_id(&handle), None);
    assert_eq!(handle.view().phase, PollPhase::Polling);
}

#[tokio::test(start_paused = true)]
async fn next_listed_request_is_presented_after_one_is_answered() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;
    api.list(&["r2"]);
    next_tick().await;

    assert_eq!(presented_id(&handle).as_deref(), Some("r2"));
}

#[tokio::test(start_paused = true)]
async fn verified_approval_is_sent() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Allow).unwrap();
    settle().await;

    assert_eq!(
        api.decisions(),
        vec![("r1".to_string(), ApprovalAction::Allow)]
    );
    assert_eq!(presented_id(&handle), None);
}

#[tokio::test(start_paused = true)]
async fn failed_verification_consumes_the_request() {
    let api = Arc::new(ScriptedApi::default());
    let handle = session(&api, denying_gate(), TwoFactorConfig::default())
        .spawn()
        .0;
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Allow).unwrap();
    settle().await;

    assert!(api.decisions().is_empty());
    assert_eq!(
        handle.view().last_decision,
        Some(DecisionOutcome::VerificationFailed {
            request_id: "r1".to_string(),
        })
    );

    next_tick().await;
    next_tick().await;
    assert_eq!(presented_id(&handle), None);
}

#[tokio::test(start_paused = true)]
async fn failed_verification_can_reprompt_when_enabled() {
    let api = Arc::new(ScriptedApi::default());
    let settings = TwoFactorConfig {
        reprompt_after_gate_failure: true,
        ..TwoFactorConfig::default()
    };
    let handle = session(&api, denying_gate(), settings).spawn().0;
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Allow).unwrap();
    settle().await;
    assert!(api.decisions().is_empty());
    assert_eq!(presented_id(&handle), None);

    next_tick().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_reoffers_the_request() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;
    api.fail_decisions(Some(Failure::Transport));

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;

    let view = handle.view();
    assert_eq!(api.decisions().len(), 1);
    assert_eq!(view.presented, None);
    assert!(view.message.unwrap().contains("connection reset"));
    assert_eq!(
        view.last_decision,
        Some(DecisionOutcome::Failed {
            request_id: "r1".to_string(),
            retry: true,
        })
    );

    api.fail_decisions(None);
    next_tick().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;
    assert_eq!(api.decisions().len(), 2);
    assert_eq!(handle.view().message, None);
}

#[tokio::test(start_paused = true)]
async fn provider_refusal_is_surfaced_and_not_retried() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;
    api.fail_decisions(Some(Failure::Provider));

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;

    let view = handle.view();
    assert!(view.message.unwrap().contains("request expired"));
    assert_eq!(
        view.last_decision,
        Some(DecisionOutcome::Failed {
            request_id: "r1".to_string(),
            retry: false,
        })
    );

    next_tick().await;
    assert_eq!(presented_id(&handle), None);
}

#[tokio::test(start_paused = true)]
async fn undecodable_decision_answer_counts_as_delivered() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;
    api.fail_decisions(Some(Failure::Decode));

    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;
    next_tick().await;

    assert_eq!(presented_id(&handle), None);
    assert_eq!(api.decisions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn answering_twice_sends_once() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r1", ApprovalAction::Allow).unwrap();
    handle.respond("r1", ApprovalAction::Allow).unwrap();
    handle.respond("r1", ApprovalAction::Deny).unwrap();
    settle().await;

    assert_eq!(
        api.decisions(),
        vec![("r1".to_string(), ApprovalAction::Allow)]
    );
}

#[tokio::test(start_paused = true)]
async fn answering_an_unpresented_request_does_nothing() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.respond("r9", ApprovalAction::Deny).unwrap();
    settle().await;

    assert!(api.decisions().is_empty());
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn sign_out_discards_presented_request_without_consuming_it() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.sign_out().unwrap();
    settle().await;
    let view = handle.view();
    assert_eq!(view.identity, None);
    assert_eq!(view.phase, PollPhase::Idle);
    assert_eq!(view.presented, None);

    handle.sign_in(alice()).unwrap();
    settle().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn sign_out_mid_poll_stops_all_polling() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    let hold = api.hold_polls();
    signed_in_with(&api, &handle, &["r1"]).await;
    assert_eq!(api.poll_count(), 1);

    handle.sign_out().unwrap();
    settle().await;
    hold.add_permits(10);
    settle().await;

    next_tick().await;
    next_tick().await;
    next_tick().await;

    assert_eq!(api.poll_count(), 1);
    assert_eq!(handle.view(), SessionView::default());
}

#[tokio::test(start_paused = true)]
async fn poll_started_for_previous_identity_is_discarded() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    let hold = api.hold_polls();
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.sign_in(bob()).unwrap();
    settle().await;
    assert_eq!(api.poll_count(), 2);

    hold.add_permits(1);
    settle().await;
    let view = handle.view();
    assert_eq!(view.identity, Some(bob()));
    assert_eq!(view.presented, None);
    assert_eq!(view.polls_completed, 0);

    hold.add_permits(1);
    settle().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
    assert_eq!(handle.view().polls_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn ticks_are_skipped_while_a_poll_is_outstanding() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    let hold = api.hold_polls();
    signed_in_with(&api, &handle, &[]).await;

    next_tick().await;
    next_tick().await;
    assert_eq!(api.poll_count(), 1);

    hold.add_permits(10);
    settle().await;
    next_tick().await;
    assert_eq!(api.poll_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_polls_run_when_the_guard_is_disabled() {
    let api = Arc::new(ScriptedApi::default());
    let settings = TwoFactorConfig {
        skip_overlapping_polls: false,
        ..TwoFactorConfig::default()
    };
    let handle = session(&api, permissive_gate(), settings).spawn().0;
    let _hold = api.hold_polls();
    signed_in_with(&api, &handle, &[]).await;

    next_tick().await;
    next_tick().await;
    assert_eq!(api.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn poll_failures_are_silent_and_polling_continues() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    api.fail_polls(Some(Failure::Transport));
    signed_in_with(&api, &handle, &["r1"]).await;

    let view = handle.view();
    assert_eq!(view.message, None);
    assert_eq!(view.phase, PollPhase::Polling);
    assert_eq!(view.polls_completed, 1);

    api.fail_polls(Some(Failure::Decode));
    next_tick().await;
    assert_eq!(presented_id(&handle), None);

    api.fail_polls(None);
    next_tick().await;
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn manual_poll_runs_between_ticks() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &[]).await;

    api.list(&["r1"]);
    handle.poll_now().unwrap();
    settle().await;

    assert_eq!(api.poll_count(), 2);
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

#[tokio::test(start_paused = true)]
async fn stored_identity_starts_polling_and_is_broadcast() {
    let api = Arc::new(ScriptedApi::default());
    let backend = MemoryStore::default();
    backend.write(&alice()).unwrap();
    let transport = Arc::new(RecordingTransport::default());

    let handle = session_over(backend, &api, permissive_gate(), TwoFactorConfig::default())
        .with_sync(transport.clone(), SyncRole::Primary)
        .spawn()
        .0;
    settle().await;

    assert_eq!(handle.view().identity, Some(alice()));
    assert_eq!(api.poll_count(), 1);
    assert_eq!(transport.sent(), vec![SyncPayload::signed_in(alice())]);
}

#[tokio::test(start_paused = true)]
async fn local_changes_are_broadcast_and_received_ones_are_not() {
    let api = Arc::new(ScriptedApi::default());
    let transport = Arc::new(RecordingTransport::default());
    let handle = session(&api, permissive_gate(), TwoFactorConfig::default())
        .with_sync(transport.clone(), SyncRole::Primary)
        .spawn()
        .0;

    handle.sign_in(alice()).unwrap();
    handle.context_received(SyncPayload::signed_in(bob())).unwrap();
    settle().await;
    assert_eq!(handle.view().identity, Some(bob()));

    handle.context_received(SyncPayload::signed_out()).unwrap();
    settle().await;
    assert_eq!(handle.view().identity, None);

    assert_eq!(transport.sent(), vec![SyncPayload::signed_in(alice())]);
}

#[tokio::test(start_paused = true)]
async fn link_activation_resends_the_current_identity() {
    let api = Arc::new(ScriptedApi::default());
    let transport = Arc::new(RecordingTransport::default());
    let handle = session(&api, permissive_gate(), TwoFactorConfig::default())
        .with_sync(transport.clone(), SyncRole::Primary)
        .spawn()
        .0;

    handle.link_activated().unwrap();
    handle.sign_in(alice()).unwrap();
    handle.link_activated().unwrap();
    settle().await;

    assert_eq!(
        transport.sent(),
        vec![
            SyncPayload::signed_in(alice()),
            SyncPayload::signed_in(alice()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn receiving_the_current_identity_changes_nothing() {
    let api = Arc::new(ScriptedApi::default());
    let handle = start(&api);
    signed_in_with(&api, &handle, &["r1"]).await;

    handle.context_received(SyncPayload::signed_in(alice())).unwrap();
    handle.context_received(SyncPayload::signed_in(alice())).unwrap();
    settle().await;

    assert_eq!(api.poll_count(), 1);
    assert_eq!(presented_id(&handle).as_deref(), Some("r1"));
}

/// A phone (primary) and a watch (companion) joined by an inactive link.
fn paired_sessions(api: &Arc<ScriptedApi>) -> (PairedLink, SessionHandle, SessionHandle) {
    let (link, phone_end, watch_end) = paired();
    let LinkEnd {
        transport: phone_transport,
        events: phone_events,
    } = phone_end;
    let LinkEnd {
        transport: watch_transport,
        events: watch_events,
    } = watch_end;

    let phone = session(api, permissive_gate(), TwoFactorConfig::default())
        .with_sync(Arc::new(phone_transport), SyncRole::Primary)
        .spawn()
        .0;
    let watch = session(api, permissive_gate(), TwoFactorConfig::default())
        .with_sync(Arc::new(watch_transport), SyncRole::Companion)
        .spawn()
        .0;
    spawn_forwarder(phone_events, phone.clone());
    spawn_forwarder(watch_events, watch.clone());

    (link, phone, watch)
}

#[tokio::test(start_paused = true)]
async fn paired_sessions_follow_each_other() {
    let api = Arc::new(ScriptedApi::default());
    let (link, phone, watch) = paired_sessions(&api);

    phone.sign_in(alice()).unwrap();
    settle().await;
    assert_eq!(watch.view().identity, None);

    link.activate();
    settle().await;
    assert_eq!(watch.view().identity, Some(alice()));
    assert_eq!(watch.view().phase, PollPhase::Polling);

    watch.sign_out().unwrap();
    settle().await;
    assert_eq!(phone.view().identity, None);
    assert_eq!(phone.view().phase, PollPhase::Idle);

    phone.sign_in(bob()).unwrap();
    settle().await;
    assert_eq!(watch.view().identity, Some(bob()));
}

#[tokio::test(start_paused = true)]
async fn activation_gives_the_companion_the_primary_identity() {
    let api = Arc::new(ScriptedApi::default());
    let (link, phone, watch) = paired_sessions(&api);

    phone.sign_in(alice()).unwrap();
    watch.sign_in(bob()).unwrap();
    settle().await;

    link.activate();
    settle().await;

    assert_eq!(phone.view().identity, Some(alice()));
    assert_eq!(watch.view().identity, phone.view().identity);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_session() {
    let api = Arc::new(ScriptedApi::default());
    let (handle, task) = session(&api, permissive_gate(), TwoFactorConfig::default()).spawn();
    signed_in_with(&api, &handle, &[]).await;

    handle.shutdown().unwrap();
    task.await.unwrap();
    next_tick().await;

    assert_eq!(api.poll_count(), 1);
    assert!(matches!(
        handle.poll_now(),
        Err(BloretError::SessionClosed)
    ));
}
