//! OnAir Core - Live playback lifecycle for OnAir
//!
//! This crate keeps a live stream playing on a page that has no control over
//! the stream itself:
//! - Engine adapter over an external adaptive-streaming engine, with a
//!   native-playback fallback
//! - Single-slot retry scheduling after fatal errors
//! - Out-of-band liveness polling that cuts the retry short
//! - LIVE / OFFLINE status indicator derived from the lifecycle phase
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          OnAir Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐                      ┌──────────────┐         │
//! │  │    Status    │    PlayerEvent       │    Engine    │         │
//! │  │    Poller    │──────┐      ┌────────│   Adapter    │         │
//! │  └──────────────┘      │      │        └──────▲───────┘         │
//! │                        ▼      ▼               │ start/destroy   │
//! │                    ┌──────────────┐           │                 │
//! │                    │  Lifecycle   │───────────┘                 │
//! │                    │  Controller  │                             │
//! │                    └──┬────────┬──┘                             │
//! │                       │        │                                │
//! │            ┌──────────▼───┐ ┌──▼───────────┐                    │
//! │            │    Retry     │ │    Status    │                    │
//! │            │  Scheduler   │ │  Indicator   │                    │
//! │            └──────────────┘ └──────────────┘                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state machine itself has no runtime dependency. The `runtime` feature
//! adds the tokio driver and the HTTP poller, `hls` adds a headless engine
//! that watches the live playlist.

pub mod error;
pub mod types;
pub mod config;
pub mod event;
pub mod engine;
pub mod retry;
pub mod indicator;
pub mod poller;
pub mod controller;
#[cfg(feature = "runtime")]
pub mod runtime;
#[cfg(feature = "hls")]
pub mod hls;

pub use error::{Error, Result};
pub use types::*;
pub use config::{EngineTuning, PlayerConfig, UnsupportedPolicy, HLS_MIME_TYPE};
pub use event::{EventSink, PlayerEvent, SessionHandlers};
pub use engine::{EngineAdapter, EngineSession, FallbackAdapter, MediaSink, PlayRejected, PlaybackEngine, StartOutcome};
pub use retry::{RetryScheduler, RetryTimer, RetryToken, TimerUnavailable};
pub use indicator::{IndicatorStatus, IndicatorView, StatusIndicator};
pub use poller::{LivenessReport, PollError, PollOutcome};
pub use controller::LifecycleController;
#[cfg(feature = "runtime")]
pub use poller::{HttpLivenessSource, LivenessSource, StatusPoller};
#[cfg(feature = "runtime")]
pub use runtime::{PlayerHandle, PlayerRuntime, TokioRetryTimer};
#[cfg(feature = "hls")]
pub use hls::{HeadlessSink, HlsPlaylistEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at startup
pub fn init() {
    tracing::info!(version = VERSION, "OnAir Core initialized");
}
