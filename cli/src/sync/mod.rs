//! Identity sync between a primary and a companion device.
//!
//! This module keeps both devices signed in as the same user without a
//! server round trip:
//! - [`SyncTransport`] - Device-to-device context propagation (enables mocking)
//! - [`SyncChannel`] - Decides what to broadcast and sends it in order
//! - [`PairedLink`] - In-process transport joining two sessions
//!
//! Only locally initiated changes are broadcast. A change received from the
//! peer is applied but never echoed back. When the link comes up only the
//! [`SyncRole::Primary`] end resends its identity, so the companion adopts
//! the primary's account and never the other way round.

pub mod link;
pub mod payload;

pub use link::{paired, spawn_forwarder, LinkEnd, LinkEvent, PairedLink};
pub use payload::SyncPayload;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::auth::{ChangeOrigin, Identity, IdentityChange};
use crate::error::{BloretError, Result};

/// Direct device-to-device context propagation.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Sends a context to the paired device.
    ///
    /// # Errors
    ///
    /// Returns [`BloretError::LinkInactive`] when the link is down.
    async fn broadcast_context(&self, payload: &SyncPayload) -> Result<()>;
}

/// Which end of a pairing a session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Source of truth; resends its identity whenever the link comes up.
    Primary,
    /// Follows the primary; stays quiet on activation.
    Companion,
}

/// Outbound half of identity sync.
///
/// Broadcasts are queued and sent one at a time by a background task, so
/// the peer sees changes in the order they happened. Dropping the channel
/// lets the task drain its queue and exit.
pub struct SyncChannel {
    outbound: mpsc::UnboundedSender<SyncPayload>,
    role: SyncRole,
}

impl SyncChannel {
    /// Starts the broadcast task over a transport.
    #[must_use]
    pub fn spawn(transport: Arc<dyn SyncTransport>, role: SyncRole) -> Self {
        let (outbound, mut queue) = mpsc::unbounded_channel::<SyncPayload>();

        tokio::spawn(async move {
            while let Some(payload) = queue.recv().await {
                match transport.broadcast_context(&payload).await {
                    Ok(()) => debug!(signed_in = payload.identity.is_some(), "context broadcast"),
                    Err(BloretError::LinkInactive) => {
                        debug!("companion link inactive; context will be resent on activation");
                    }
                    Err(e) => warn!(error = %e, "context broadcast failed"),
                }
            }
        });

        Self { outbound, role }
    }

    /// Broadcasts a locally initiated identity change.
    ///
    /// Changes that arrived from the peer are ignored.
    pub fn on_identity_change(&self, change: &IdentityChange) {
        if change.origin == ChangeOrigin::Local {
            self.publish(SyncPayload::from(change.identity.clone()));
        }
    }

    /// Re-sends the current identity when the link comes up.
    ///
    /// Only the primary resends; a companion waits for the primary's context.
    pub fn on_link_activated(&self, current: Option<&Identity>) {
        if self.role == SyncRole::Companion {
            debug!("companion link up; waiting for the primary's identity");
            return;
        }
        if let Some(identity) = current {
            self.publish(SyncPayload::signed_in(identity.clone()));
        }
    }

    fn publish(&self, payload: SyncPayload) {
        if self.outbound.send(payload).is_err() {
            warn!("sync broadcast task has stopped");
        }
    }
}
