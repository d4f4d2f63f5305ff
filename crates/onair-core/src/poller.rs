//! Status Poller - out-of-band liveness checks
//!
//! Each cycle produces a [`PollOutcome`]. Failures are values, not panics or
//! early returns: the controller receives them and explicitly discards them,
//! and the loop always sleeps and polls again.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Liveness report returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessReport {
    /// Is any stream being produced right now
    pub live: bool,
    /// Audience size, when the server reports one
    #[serde(default, deserialize_with = "lenient_count")]
    pub viewers: Option<u32>,
    /// Number of known streams
    #[serde(default, deserialize_with = "lenient_count")]
    pub stream_count: Option<u32>,
}

impl LivenessReport {
    /// Parse a status response body
    pub fn parse(body: &str) -> Result<Self, PollError> {
        serde_json::from_str(body).map_err(|e| PollError::Parse(e.to_string()))
    }
}

/// Counts outside `u32` or of the wrong JSON type are dropped rather than
/// failing the whole report.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok()))
}

/// Why a poll cycle produced no information
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Status request failed: {0}")]
    Network(String),

    #[error("Status endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed status report: {0}")]
    Parse(String),
}

/// Result of one poll cycle
pub type PollOutcome = Result<LivenessReport, PollError>;

#[cfg(feature = "runtime")]
pub use self::runtime::{HttpLivenessSource, LivenessSource, StatusPoller};

#[cfg(feature = "runtime")]
mod runtime {
    use super::*;
    use crate::event::{EventSink, PlayerEvent};
    use async_trait::async_trait;
    use reqwest::Client;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{debug, instrument};
    use url::Url;

    /// Where liveness reports come from
    #[async_trait]
    pub trait LivenessSource: Send + Sync {
        async fn fetch(&self) -> PollOutcome;
    }

    /// Liveness over HTTP
    pub struct HttpLivenessSource {
        client: Client,
        url: Url,
    }

    impl HttpLivenessSource {
        pub fn new(url: Url, timeout: Duration) -> crate::Result<Self> {
            let client = Client::builder().timeout(timeout).build()?;
            Ok(Self { client, url })
        }

        pub fn with_client(client: Client, url: Url) -> Self {
            Self { client, url }
        }

        pub fn url(&self) -> &Url {
            &self.url
        }
    }

    #[async_trait]
    impl LivenessSource for HttpLivenessSource {
        #[instrument(skip(self), fields(url = %self.url))]
        async fn fetch(&self) -> PollOutcome {
            let response = self
                .client
                .get(self.url.clone())
                .send()
                .await
                .map_err(|e| PollError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(PollError::Status(status.as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|e| PollError::Network(e.to_string()))?;

            LivenessReport::parse(&body)
        }
    }

    /// Infinite poll loop
    pub struct StatusPoller<S> {
        source: S,
        interval: Duration,
    }

    impl<S: LivenessSource> StatusPoller<S> {
        pub fn new(source: S, interval: Duration) -> Self {
            Self { source, interval }
        }

        /// Poll now, then every `interval` regardless of the outcome.
        /// Never returns; abort the task to stop it.
        pub async fn run(self, sink: Arc<dyn EventSink>) {
            loop {
                let outcome = self.source.fetch().await;
                match &outcome {
                    Ok(report) => debug!(live = report.live, viewers = ?report.viewers, "Status poll"),
                    Err(e) => debug!(error = %e, "Status poll gave no information"),
                }
                sink.send(PlayerEvent::Liveness(outcome));

                tokio::time::sleep(self.interval).await;
            }
        }
    }
}
