//! In-process link joining a primary and a companion session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{BloretError, Result};
use crate::session::SessionHandle;
use crate::sync::{SyncPayload, SyncTransport};

/// Something the link delivers to one of its ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link became active.
    Activated,
    /// The peer broadcast a context document.
    Context(String),
}

/// Controls the shared activation state of a pair of link ends.
pub struct PairedLink {
    active: Arc<AtomicBool>,
    ends: [mpsc::UnboundedSender<LinkEvent>; 2],
}

/// Sending half of one link end.
pub struct LinkTransport {
    active: Arc<AtomicBool>,
    peer: mpsc::UnboundedSender<LinkEvent>,
}

/// One side of the link: a transport to the peer and the events for this side.
pub struct LinkEnd {
    /// Broadcasts to the peer.
    pub transport: LinkTransport,
    /// Events delivered to this side.
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Creates an inactive link and its two ends.
#[must_use]
pub fn paired() -> (PairedLink, LinkEnd, LinkEnd) {
    let active = Arc::new(AtomicBool::new(false));
    let (to_first, first_events) = mpsc::unbounded_channel();
    let (to_second, second_events) = mpsc::unbounded_channel();

    let first = LinkEnd {
        transport: LinkTransport {
            active: Arc::clone(&active),
            peer: to_second.clone(),
        },
        events: first_events,
    };
    let second = LinkEnd {
        transport: LinkTransport {
            active: Arc::clone(&active),
            peer: to_first.clone(),
        },
        events: second_events,
    };

    let link = PairedLink {
        active,
        ends: [to_first, to_second],
    };
    (link, first, second)
}

impl PairedLink {
    /// Brings the link up and tells both ends.
    pub fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            for end in &self.ends {
                let _ = end.send(LinkEvent::Activated);
            }
        }
    }

    /// Takes the link down. Broadcasts fail until it is activated again.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether broadcasts currently go through.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTransport for LinkTransport {
    async fn broadcast_context(&self, payload: &SyncPayload) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(BloretError::LinkInactive);
        }
        let context = payload.to_context()?;
        self.peer
            .send(LinkEvent::Context(context))
            .map_err(|_| BloretError::LinkInactive)
    }
}

/// Feeds link events for one end into its session.
///
/// Stops when the link or the session goes away.
pub fn spawn_forwarder(
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    session: SessionHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let delivered = match event {
                LinkEvent::Activated => session.link_activated(),
                LinkEvent::Context(context) => match SyncPayload::from_context(&context) {
                    Ok(payload) => session.context_received(payload),
                    Err(e) => {
                        warn!(error = %e, "ignoring unreadable context from companion");
                        continue;
                    }
                },
            };
            if delivered.is_err() {
                break;
            }
        }
    })
}
