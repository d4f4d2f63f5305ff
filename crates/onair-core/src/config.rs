//! Player configuration
//!
//! Every field has a default matching the stock page setup, so a JSON file
//! only needs to name what it overrides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// MIME type checked on the sink for native playback
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Settings handed to the adaptive-streaming engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    /// Run demuxing off the main thread when the engine supports it
    pub enable_worker: bool,
    /// Low-latency live mode
    pub low_latency_mode: bool,
    /// Seconds of already-played media kept behind the playhead
    pub back_buffer_length: f64,
    /// Distance from the live edge to sync to, in fragments
    pub live_sync_duration_count: u32,
    /// Maximum tolerated distance from the live edge, in fragments
    pub live_max_latency_duration_count: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            enable_worker: true,
            low_latency_mode: false,
            back_buffer_length: 300.0,
            live_sync_duration_count: 5,
            live_max_latency_duration_count: 10,
        }
    }
}

/// What to do when neither playback path exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedPolicy {
    /// Show the unavailable indicator and never retry on our own
    Permanent,
    /// Treat it like a transient failure and arm the retry timer
    Retry,
}

impl Default for UnsupportedPolicy {
    fn default() -> Self {
        UnsupportedPolicy::Permanent
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Manifest URL loaded on every start attempt
    pub source_url: String,
    /// Liveness endpoint polled by the status poller
    pub status_url: String,
    /// Delay between a fatal error and the next start attempt (ms)
    pub retry_delay_ms: u64,
    /// Delay between two liveness polls (ms)
    pub poll_interval_ms: u64,
    /// Timeout for a single liveness or manifest request (ms)
    pub request_timeout_ms: u64,
    /// Consecutive playlist refresh failures tolerated by the headless engine
    pub max_refresh_failures: u32,
    /// MIME type used for the native capability check
    pub native_mime_type: String,
    /// Capability absence handling
    pub unsupported_policy: UnsupportedPolicy,
    /// Engine settings
    pub engine: EngineTuning,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            source_url: "/hls/stream.m3u8".to_string(),
            status_url: "/api/status".to_string(),
            retry_delay_ms: 5000,
            poll_interval_ms: 10000,
            request_timeout_ms: 10000,
            max_refresh_failures: 3,
            native_mime_type: HLS_MIME_TYPE.to_string(),
            unsupported_policy: UnsupportedPolicy::Permanent,
            engine: EngineTuning::default(),
        }
    }
}

impl PlayerConfig {
    /// Config tuned for low-latency live streams
    pub fn low_latency() -> Self {
        Self {
            engine: EngineTuning {
                low_latency_mode: true,
                back_buffer_length: 30.0,
                live_sync_duration_count: 2,
                live_max_latency_duration_count: 4,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Reject settings the lifecycle cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(Error::InvalidConfig("source_url is empty".into()));
        }
        if self.status_url.trim().is_empty() {
            return Err(Error::InvalidConfig("status_url is empty".into()));
        }
        if self.retry_delay_ms == 0 {
            return Err(Error::InvalidConfig("retry_delay_ms must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be > 0".into()));
        }
        if self.engine.back_buffer_length < 0.0 {
            return Err(Error::InvalidConfig("engine.back_buffer_length must be >= 0".into()));
        }
        if self.engine.live_sync_duration_count >= self.engine.live_max_latency_duration_count {
            return Err(Error::InvalidConfig(format!(
                "engine.live_sync_duration_count ({}) must be below live_max_latency_duration_count ({})",
                self.engine.live_sync_duration_count, self.engine.live_max_latency_duration_count
            )));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
