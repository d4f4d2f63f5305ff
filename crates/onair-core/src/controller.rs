//! Lifecycle Controller - reconnection state machine
//!
//! Owns the only playback session and the only retry slot. Every signal
//! arrives through [`LifecycleController::handle`] (or the matching `on_*`
//! method), one at a time, and each call runs a complete transition before
//! returning.
//!
//! ```text
//!              manifest parsed
//!   Offline ───────────────────────▶ Live
//!     │  ▲                            │
//!     │  │ fatal error / unsupported  │ fatal error
//!     │  └──────────── Starting ◀─────┘ (via Offline + retry)
//!     │                   ▲
//!     └───────────────────┘
//!       retry fired / poller reports live
//! ```

use crate::{
    config::{PlayerConfig, UnsupportedPolicy},
    engine::{EngineAdapter, EngineSession, StartOutcome},
    event::{EventSink, PlayerEvent, SessionHandlers},
    indicator::{IndicatorView, StatusIndicator},
    poller::PollOutcome,
    retry::{RetryScheduler, RetryTimer, RetryToken},
    Capability, LifecycleStats, Phase, SessionId, Trigger,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Playback lifecycle state machine
pub struct LifecycleController {
    config: PlayerConfig,
    phase: Phase,
    capability: Capability,
    adapter: Box<dyn EngineAdapter>,
    session: Option<Box<dyn EngineSession>>,
    retry: RetryScheduler,
    indicator: Box<dyn StatusIndicator>,
    events: Arc<dyn EventSink>,
    viewers: Option<u32>,
    next_session: u64,
    stats: LifecycleStats,
}

impl LifecycleController {
    /// Create a controller in `Offline` and render that right away, before
    /// any start attempt.
    pub fn new(
        config: PlayerConfig,
        adapter: Box<dyn EngineAdapter>,
        indicator: Box<dyn StatusIndicator>,
        timer: Box<dyn RetryTimer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let retry = RetryScheduler::new(config.retry_delay(), timer);
        let mut controller = Self {
            config,
            phase: Phase::Offline,
            capability: Capability::Available,
            adapter,
            session: None,
            retry,
            indicator,
            events,
            viewers: None,
            next_session: 0,
            stats: LifecycleStats::default(),
        };
        controller.render();
        controller
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn viewers(&self) -> Option<u32> {
        self.viewers
    }

    pub fn stats(&self) -> LifecycleStats {
        self.stats
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Current session id, if one exists
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id())
    }

    /// True while a session exists and is attached to its sink
    pub fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.has_media())
    }

    pub fn retry_armed(&self) -> bool {
        self.retry.is_armed()
    }

    /// Indicator state derived from the controller
    pub fn view(&self) -> IndicatorView {
        IndicatorView::derive(self.phase, self.capability, self.viewers)
    }

    /// First start attempt
    pub fn start(&mut self) -> bool {
        self.ensure_playing(Trigger::Initial)
    }

    /// Dispatch one event
    pub fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::ManifestParsed { session } => self.on_manifest_parsed(session),
            PlayerEvent::FatalError { session, reason } => self.on_fatal_error(session, &reason),
            PlayerEvent::RetryFired(token) => self.on_retry_fired(token),
            PlayerEvent::Liveness(outcome) => self.on_liveness(outcome),
            PlayerEvent::Shutdown => self.teardown(),
        }
    }

    /// Start a session unless one is already active.
    ///
    /// Returns true when the adapter's `start` was called.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn ensure_playing(&mut self, trigger: Trigger) -> bool {
        if self.has_session() {
            debug!(%trigger, "Session already active, nothing to do");
            return false;
        }

        if self.capability == Capability::Unsupported
            && self.config.unsupported_policy == UnsupportedPolicy::Permanent
            && trigger != Trigger::Recheck
        {
            debug!(%trigger, "No playback path on this client, not starting");
            return false;
        }

        self.retry.cancel();

        // A session that lost its sink is useless, release it first
        if let Some(mut detached) = self.session.take() {
            debug!(session = %detached.id(), "Dropping detached session");
            detached.destroy();
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.stats.start_attempts += 1;
        if trigger == Trigger::Liveness {
            self.stats.liveness_preemptions += 1;
        }
        let reason = trigger.to_string();
        self.set_phase(Phase::Starting, &reason);

        let handlers = SessionHandlers::new(id, self.events.clone());
        match self.adapter.start(&self.config.source_url, handlers) {
            Ok(StartOutcome::Started(session)) => {
                debug!(session = %session.id(), kind = %session.kind(), "Session created");
                self.capability = Capability::Available;
                self.session = Some(session);
            }
            Ok(StartOutcome::Unsupported) => {
                warn!("Neither the engine nor native playback can play this source");
                self.mark_unsupported("unsupported");
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, code = e.error_code(), "Start attempt failed");
                self.set_phase(Phase::Offline, "start failed");
                self.retry.arm();
            }
            Err(e) => {
                // Retrying the same source would fail the same way
                warn!(error = %e, code = e.error_code(), "Source cannot be played");
                self.mark_unsupported("start rejected");
            }
        }

        self.render();
        true
    }

    /// Manifest parsed (or native metadata loaded)
    pub fn on_manifest_parsed(&mut self, session: SessionId) {
        if !self.is_current(session) {
            self.stale(session, "manifest parsed");
            return;
        }

        if self.phase != Phase::Live {
            self.set_phase(Phase::Live, "manifest parsed");
        }

        // Autoplay policies may refuse; the indicator is already right
        if let Err(rejected) = self.adapter.play() {
            debug!(%rejected, "Play request refused");
        }

        self.retry.cancel();
        self.render();
    }

    /// Fatal error from the engine or the native path
    pub fn on_fatal_error(&mut self, session: SessionId, reason: &str) {
        if !self.is_current(session) {
            self.stale(session, "fatal error");
            return;
        }

        warn!(%session, reason, "Fatal playback error");
        self.stats.fatal_errors += 1;

        if let Some(mut current) = self.session.take() {
            current.destroy();
        }
        self.viewers = None;
        self.set_phase(Phase::Offline, "fatal error");
        self.retry.arm();
        self.render();
    }

    /// Retry timer expiry
    pub fn on_retry_fired(&mut self, token: RetryToken) {
        if self.retry.fire(token) {
            self.stats.retries_fired += 1;
            self.ensure_playing(Trigger::Retry);
        }
    }

    /// One poll cycle finished
    pub fn on_liveness(&mut self, outcome: PollOutcome) {
        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                debug!(error = %e, "Ignoring failed status poll");
                return;
            }
        };

        if report.live && !self.has_session() {
            info!("Server reports stream live, starting ahead of retry");
            self.ensure_playing(Trigger::Liveness);
        }

        if self.phase == Phase::Live && self.viewers != report.viewers {
            self.viewers = report.viewers;
            self.render();
        }
    }

    /// Forget a capability absence and check again
    pub fn recheck_capability(&mut self) -> bool {
        if self.capability != Capability::Unsupported {
            return false;
        }
        self.capability = Capability::Available;
        self.ensure_playing(Trigger::Recheck)
    }

    /// Release the session and the retry, show offline
    pub fn teardown(&mut self) {
        info!("Tearing down player");
        self.retry.cancel();
        if let Some(mut session) = self.session.take() {
            session.destroy();
        }
        self.viewers = None;
        if self.phase != Phase::Offline {
            self.set_phase(Phase::Offline, "teardown");
        }
        self.render();
    }

    fn mark_unsupported(&mut self, reason: &str) {
        self.capability = Capability::Unsupported;
        self.set_phase(Phase::Offline, reason);
        if self.config.unsupported_policy == UnsupportedPolicy::Retry {
            self.retry.arm();
        }
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session_id() == Some(session)
    }

    fn stale(&mut self, session: SessionId, what: &str) {
        self.stats.stale_events += 1;
        debug!(%session, current = ?self.session_id(), event = what, "Ignoring event from old session");
    }

    fn set_phase(&mut self, to: Phase, reason: &str) {
        let from = self.phase;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "Unexpected phase transition");
        }
        if to != Phase::Live {
            self.viewers = None;
        }
        self.phase = to;
        info!(%from, %to, reason, "Phase transition");
    }

    fn render(&mut self) {
        let view = self.view();
        self.indicator.render(&view);
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("phase", &self.phase)
            .field("capability", &self.capability)
            .field("session", &self.session_id())
            .field("retry", &self.retry)
            .field("viewers", &self.viewers)
            .finish()
    }
}
