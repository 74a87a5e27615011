//! The `bloret watch` command.
//!
//! Runs a session, redraws it whenever its snapshot changes and reads
//! answers from stdin. With `--pair` a companion session on in-memory
//! storage is linked to the primary one and drawn with the watch layout;
//! its shortcuts carry a `w` prefix.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::debug;

use crate::auth::{open_backend, CredentialStore, MemoryStore};
use crate::biometric::BiometricGate;
use crate::cli::present::render;
use crate::cli::LayoutArg;
use crate::client::BloretApiClient;
use crate::config::load_config;
use crate::error::Result;
use crate::session::{Session, SessionHandle, SessionView};
use crate::sync::{paired, spawn_forwarder, PairedLink, SyncRole};
use crate::two_factor::{ApprovalAction, TwoFactorApi};

const COMPANION_PREFIX: &str = "w";

/// Which session a line of input addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Primary,
    Companion,
}

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Answer(ApprovalAction),
    Refresh,
    SignOut,
    Quit,
}

fn parse_input(line: &str) -> Option<(Target, Input)> {
    let line = line.trim().to_lowercase();
    let (target, word) = match line.strip_prefix(COMPANION_PREFIX) {
        Some(rest) if !rest.is_empty() => (Target::Companion, rest),
        _ => (Target::Primary, line.as_str()),
    };

    let input = match word {
        "a" | "allow" => Input::Answer(ApprovalAction::Allow),
        "d" | "deny" => Input::Answer(ApprovalAction::Deny),
        "r" | "refresh" => Input::Refresh,
        "l" | "logout" => Input::SignOut,
        "q" | "quit" if target == Target::Primary => Input::Quit,
        _ => return None,
    };
    Some((target, input))
}

struct Companion {
    link: PairedLink,
    session: SessionHandle,
    view: watch::Receiver<SessionView>,
}

/// Handle the `bloret watch` command.
pub async fn handle_watch(layout: LayoutArg, pair: bool) -> Result<()> {
    let config = load_config()?;
    let api: Arc<dyn TwoFactorApi> = Arc::new(BloretApiClient::new(&config.api)?);
    let gate = Arc::new(BiometricGate::from_config(&config.biometric));
    let store = CredentialStore::new(open_backend(&config.credentials)?);

    let mut primary = Session::new(
        store,
        Arc::clone(&api),
        Arc::clone(&gate),
        config.two_factor.clone(),
    );

    let mut companion = None;
    if pair {
        let (link, primary_end, companion_end) = paired();
        primary = primary.with_sync(Arc::new(primary_end.transport), SyncRole::Primary);

        let (session, _task) = Session::new(
            CredentialStore::new(Box::new(MemoryStore::default())),
            api,
            gate,
            config.two_factor.clone(),
        )
        .with_sync(Arc::new(companion_end.transport), SyncRole::Companion)
        .spawn();
        spawn_forwarder(companion_end.events, session.clone());

        companion = Some((link, session, primary_end.events));
    }

    let (primary, primary_task) = primary.spawn();
    let mut companion = companion.map(|(link, session, primary_events)| {
        spawn_forwarder(primary_events, primary.clone());
        link.activate();
        Companion {
            link,
            view: session.subscribe(),
            session,
        }
    });

    let mut primary_view = primary.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut screen = String::new();
    draw(layout, &primary, companion.as_ref(), &mut screen);

    loop {
        tokio::select! {
            changed = primary_view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(()) = companion_changed(companion.as_mut()) => {}
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Some((_, Input::Quit)) => break,
                    Some((target, input)) => {
                        let session = match (target, &companion) {
                            (Target::Primary, _) => &primary,
                            (Target::Companion, Some(companion)) => &companion.session,
                            (Target::Companion, None) => {
                                println!("No companion session. Run with --pair.");
                                continue;
                            }
                        };
                        apply(session, input)?;
                    }
                    None => println!("Commands: a(llow), d(eny), r(efresh), l(ogout), q(uit)"),
                }
            }
        }
        draw(layout, &primary, companion.as_ref(), &mut screen);
    }

    if let Some(companion) = &companion {
        companion.link.deactivate();
        let _ = companion.session.shutdown();
    }
    primary.shutdown()?;
    if let Err(e) = primary_task.await {
        debug!(error = %e, "session task ended abnormally");
    }

    Ok(())
}

async fn companion_changed(companion: Option<&mut Companion>) -> Option<()> {
    match companion {
        Some(companion) => companion.view.changed().await.ok(),
        None => std::future::pending().await,
    }
}

fn apply(session: &SessionHandle, input: Input) -> Result<()> {
    match input {
        Input::Answer(action) => match session.view().presented {
            Some(request) => session.respond(request.request_id, action),
            None => {
                println!("No sign-in request to answer.");
                Ok(())
            }
        },
        Input::Refresh => session.poll_now(),
        Input::SignOut => session.sign_out(),
        Input::Quit => Ok(()),
    }
}

/// Prints the current snapshots unless they render the same as last time.
fn draw(
    layout: LayoutArg,
    primary: &SessionHandle,
    companion: Option<&Companion>,
    screen: &mut String,
) {
    let mut next = render(layout, &primary.view(), "");
    if let Some(companion) = companion {
        next.push_str("\n-- companion --\n");
        next.push_str(&render(
            LayoutArg::Watch,
            &companion.session.view(),
            COMPANION_PREFIX,
        ));
    }

    if next != *screen {
        println!("{next}");
        *screen = next;
    }
}
