//! Status Indicator - LIVE / OFFLINE presentation
//!
//! The controller never stores what is on screen. It derives an
//! [`IndicatorView`] from its own state after every transition and hands it
//! to a [`StatusIndicator`], which only writes it out.

use crate::{Capability, Phase};
use serde::{Deserialize, Serialize};

/// What the status element shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorStatus {
    Live,
    Offline,
    /// Capability absence, nothing will ever play on this client
    Unavailable,
}

impl IndicatorStatus {
    /// Text for the status element
    pub fn text(&self) -> &'static str {
        match self {
            IndicatorStatus::Live => "LIVE",
            IndicatorStatus::Offline => "Offline - waiting for stream...",
            IndicatorStatus::Unavailable => "Live playback is not supported",
        }
    }

    /// Class attribute for the status element
    pub fn css_class(&self) -> &'static str {
        match self {
            IndicatorStatus::Live => "status live",
            IndicatorStatus::Offline => "status offline",
            IndicatorStatus::Unavailable => "status unavailable",
        }
    }
}

impl std::fmt::Display for IndicatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Derived indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorView {
    pub status: IndicatorStatus,
    /// Viewer count, only ever present while live
    pub viewers: Option<u32>,
}

impl IndicatorView {
    /// Derive the view from controller state.
    ///
    /// `Starting` still shows offline: nothing plays until the manifest is in.
    pub fn derive(phase: Phase, capability: Capability, viewers: Option<u32>) -> Self {
        match (phase, capability) {
            (Phase::Live, _) => IndicatorView {
                status: IndicatorStatus::Live,
                viewers,
            },
            (_, Capability::Unsupported) => IndicatorView {
                status: IndicatorStatus::Unavailable,
                viewers: None,
            },
            _ => IndicatorView {
                status: IndicatorStatus::Offline,
                viewers: None,
            },
        }
    }

    /// Text for the viewer-count element, empty when there is nothing to show
    pub fn viewers_text(&self) -> String {
        match self.viewers {
            Some(1) => "1 viewer".to_string(),
            Some(n) => format!("{} viewers", n),
            None => String::new(),
        }
    }
}

/// Rendering surface for the indicator
pub trait StatusIndicator {
    fn render(&mut self, view: &IndicatorView);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Indicator that keeps every rendered view
    #[derive(Clone, Default)]
    pub struct RecordingIndicator {
        pub views: Arc<Mutex<Vec<IndicatorView>>>,
    }

    impl RecordingIndicator {
        pub fn last(&self) -> Option<IndicatorView> {
            self.views.lock().unwrap().last().copied()
        }

        pub fn all(&self) -> Vec<IndicatorView> {
            self.views.lock().unwrap().clone()
        }
    }

    impl StatusIndicator for RecordingIndicator {
        fn render(&mut self, view: &IndicatorView) {
            self.views.lock().unwrap().push(*view);
        }
    }
}
