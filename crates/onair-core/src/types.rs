//! Core types for OnAir

use serde::{Deserialize, Serialize};

/// Identifier of one playback session.
///
/// Allocated by the controller on every start attempt, strictly increasing,
/// so events from a destroyed session can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// A session was created and is waiting for its manifest
    Starting,
    /// The manifest was parsed, media is attached
    Live,
    /// No usable session
    Offline,
}

impl Phase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Offline, Starting) | (Offline, Live) |
            (Starting, Live) | (Starting, Offline) |
            (Live, Offline) | (Live, Starting)
        )
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Offline
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Starting => write!(f, "starting"),
            Phase::Live => write!(f, "live"),
            Phase::Offline => write!(f, "offline"),
        }
    }
}

/// Which playback path a session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// The adaptive-streaming engine drives the sink
    Engine,
    /// The sink plays the manifest itself
    Native,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Engine => write!(f, "engine"),
            SessionKind::Native => write!(f, "native"),
        }
    }
}

/// What asked the controller to ensure playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// First start when the player is constructed
    Initial,
    /// The retry timer fired
    Retry,
    /// The status poller reported the stream live
    Liveness,
    /// Explicit re-check after a capability absence
    Recheck,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Initial => write!(f, "initial"),
            Trigger::Retry => write!(f, "retry"),
            Trigger::Liveness => write!(f, "liveness"),
            Trigger::Recheck => write!(f, "recheck"),
        }
    }
}

/// Result of the last capability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Not checked yet, or the last check found a path
    Available,
    /// Neither the engine nor the native path can play the source
    Unsupported,
}

/// Counters kept by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStats {
    /// Calls into the engine adapter's `start`
    pub start_attempts: u64,
    /// Fatal errors accepted from the current session
    pub fatal_errors: u64,
    /// Retry timer expiries that led to a start attempt
    pub retries_fired: u64,
    /// Start attempts triggered by the status poller
    pub liveness_preemptions: u64,
    /// Engine events dropped because their session was gone
    pub stale_events: u64,
}
