//! Event bus between the collaborators and the controller
//!
//! Engine callbacks, retry expiries and poll results all become a
//! [`PlayerEvent`] pushed through an [`EventSink`]. Whoever owns the
//! controller drains the queue and feeds events to
//! [`LifecycleController::handle`](crate::LifecycleController::handle) one at
//! a time, which keeps every transition atomic.

use crate::{poller::PollOutcome, retry::RetryToken, SessionId};
use std::sync::Arc;

/// Signal delivered to the lifecycle controller
#[derive(Debug)]
pub enum PlayerEvent {
    /// The session's manifest was parsed (or native metadata loaded)
    ManifestParsed { session: SessionId },
    /// The session hit an error it cannot recover from
    FatalError { session: SessionId, reason: String },
    /// The retry timer armed with this token expired
    RetryFired(RetryToken),
    /// One status poll cycle finished
    Liveness(PollOutcome),
    /// Stop the event loop
    Shutdown,
}

/// Destination for player events
pub trait EventSink: Send + Sync {
    fn send(&self, event: PlayerEvent);
}

#[cfg(feature = "runtime")]
impl EventSink for tokio::sync::mpsc::UnboundedSender<PlayerEvent> {
    fn send(&self, event: PlayerEvent) {
        // The receiver only goes away when the loop shuts down
        if tokio::sync::mpsc::UnboundedSender::send(self, event).is_err() {
            tracing::debug!("Event loop gone, dropping event");
        }
    }
}

/// The two callbacks an engine registers for one session
///
/// Cheap to clone; engines may hand copies to background tasks. Every event
/// is stamped with the session it belongs to.
#[derive(Clone)]
pub struct SessionHandlers {
    session: SessionId,
    sink: Arc<dyn EventSink>,
}

impl SessionHandlers {
    pub fn new(session: SessionId, sink: Arc<dyn EventSink>) -> Self {
        Self { session, sink }
    }

    /// Session these handlers report for
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Manifest parsed / metadata loaded
    pub fn manifest_parsed(&self) {
        self.sink.send(PlayerEvent::ManifestParsed { session: self.session });
    }

    /// Fatal playback error
    pub fn fatal_error(&self, reason: impl Into<String>) {
        self.sink.send(PlayerEvent::FatalError {
            session: self.session,
            reason: reason.into(),
        });
    }
}

impl std::fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("session", &self.session)
            .finish()
    }
}
