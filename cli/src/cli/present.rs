//! Text rendering of session snapshots.
//!
//! Both layouts draw the same [`SessionView`]; they differ only in how much
//! they show.

use std::fmt::Write;

use crate::cli::LayoutArg;
use crate::session::SessionView;
use crate::two_factor::{ApprovalAction, DecisionOutcome, PollPhase};

/// Renders a snapshot. `keys` prefixes the answer shortcuts shown.
#[must_use]
pub fn render(layout: LayoutArg, view: &SessionView, keys: &str) -> String {
    match layout {
        LayoutArg::Phone => render_phone(view, keys),
        LayoutArg::Watch => render_watch(view, keys),
    }
}

fn render_phone(view: &SessionView, keys: &str) -> String {
    let mut out = String::new();

    let Some(identity) = &view.identity else {
        out.push_str("Not signed in. Run 'bloret auth login' to sign in.\n");
        return out;
    };

    match &identity.email {
        Some(email) => {
            let _ = writeln!(out, "Signed in as {} ({email})", identity.username);
        }
        None => {
            let _ = writeln!(out, "Signed in as {}", identity.username);
        }
    }

    if view.phase == PollPhase::Polling {
        if view.polls_completed == 0 {
            out.push_str("Checking for sign-in attempts...\n");
        } else {
            out.push_str("Watching for sign-in attempts.\n");
        }
    }

    if let Some(request) = &view.presented {
        out.push('\n');
        out.push_str("Sign-in request\n");
        let _ = writeln!(out, "  IP:       {}", request.source_ip);
        let _ = writeln!(out, "  Device:   {}", request.device_description);
        let _ = writeln!(
            out,
            "  Received: {}",
            request.received_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "  [{keys}a] Allow   [{keys}d] Deny");
    }

    if let Some(outcome) = &view.last_decision {
        out.push('\n');
        out.push_str(&describe(outcome));
        out.push('\n');
    }

    if let Some(message) = &view.message {
        let _ = writeln!(out, "Error: {message}");
    }

    out
}

fn render_watch(view: &SessionView, keys: &str) -> String {
    let mut out = String::new();

    let Some(identity) = &view.identity else {
        out.push_str("Sign in on the primary device\n");
        return out;
    };
    let _ = writeln!(out, "{} - signed in", identity.username);

    if let Some(request) = &view.presented {
        out.push_str("Login request\n");
        let _ = writeln!(out, "IP: {}", request.source_ip);
        let _ = writeln!(out, "Device: {}", request.device_description);
        let _ = writeln!(out, "[{keys}a] Allow [{keys}d] Deny");
    }

    if let Some(message) = &view.message {
        let _ = writeln!(out, "! {message}");
    }

    out
}

fn describe(outcome: &DecisionOutcome) -> String {
    match outcome {
        DecisionOutcome::Sent {
            request_id,
            action: ApprovalAction::Allow,
        } => format!("Approved sign-in request {request_id}."),
        DecisionOutcome::Sent {
            request_id,
            action: ApprovalAction::Deny,
        } => format!("Denied sign-in request {request_id}."),
        DecisionOutcome::VerificationFailed { request_id } => {
            format!("Verification failed; sign-in request {request_id} was not approved.")
        }
        DecisionOutcome::Failed {
            request_id,
            retry: true,
        } => format!("Answer for {request_id} was not delivered; it will be shown again."),
        DecisionOutcome::Failed {
            request_id,
            retry: false,
        } => format!("Answer for {request_id} was not accepted."),
    }
}
