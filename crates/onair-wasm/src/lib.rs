//! OnAir WASM - Browser binding for the live player
//!
//! Runs the OnAir lifecycle against a page's `<video>` element:
//! - hls.js as the primary engine, native HLS as the fallback
//! - LIVE / OFFLINE status element and viewer count
//! - `setTimeout` retry and `fetch` liveness polling
//!
//! ## Usage
//!
//! ```javascript
//! import init, { OnAirPlayer } from '@onair/wasm';
//!
//! await init();
//! const player = new OnAirPlayer('video', 'status', 'viewers');
//! player.start();
//! ```

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use onair_core::{EventSink, FallbackAdapter, LifecycleController, PlayerConfig, PlayerEvent};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlVideoElement};

mod hls_js;
mod indicator;
mod poll;
mod sink;
mod timer;

pub use hls_js::{HlsJsEngine, HlsJsSession};
pub use indicator::DomIndicator;
pub use sink::{NativeSession, VideoSink};
pub use timer::BrowserRetryTimer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("[OnAir WASM] Initialized v{}", onair_core::VERSION).into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Event queue feeding the controller
struct ChannelSink(UnboundedSender<PlayerEvent>);

impl EventSink for ChannelSink {
    fn send(&self, event: PlayerEvent) {
        // Closed once the player is destroyed
        let _ = self.0.unbounded_send(event);
    }
}

fn element(id: &str) -> Result<Element, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(id))
        .ok_or_else(|| JsValue::from_str(&format!("element #{} not found", id)))
}

fn to_js(err: onair_core::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Live player bound to page elements
#[wasm_bindgen]
pub struct OnAirPlayer {
    controller: Rc<RefCell<LifecycleController>>,
    events: Arc<dyn EventSink>,
    receiver: Option<UnboundedReceiver<PlayerEvent>>,
    stopped: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl OnAirPlayer {
    /// Player with the default configuration
    #[wasm_bindgen(constructor)]
    pub fn new(video_id: &str, status_id: &str, viewers_id: &str) -> Result<OnAirPlayer, JsValue> {
        Self::build(video_id, status_id, viewers_id, PlayerConfig::default())
    }

    /// Player configured from a JSON document; missing fields keep defaults
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(
        video_id: &str,
        status_id: &str,
        viewers_id: &str,
        config_json: &str,
    ) -> Result<OnAirPlayer, JsValue> {
        let config = PlayerConfig::from_json(config_json).map_err(to_js)?;
        Self::build(video_id, status_id, viewers_id, config)
    }

    /// Start playback and liveness polling. A second call, or a call after
    /// `destroy()`, does nothing.
    pub fn start(&mut self) {
        if self.stopped.get() {
            return;
        }
        let Some(mut receiver) = self.receiver.take() else {
            return;
        };

        let (status_url, interval) = {
            let controller = self.controller.borrow();
            (controller.config().status_url.clone(), controller.config().poll_interval())
        };

        self.controller.borrow_mut().start();

        let controller = self.controller.clone();
        let stopped = self.stopped.clone();
        wasm_bindgen_futures::spawn_local(async move {
            while let Some(event) = receiver.next().await {
                // Events queued before destroy() must not restart anything
                if stopped.get() || matches!(event, PlayerEvent::Shutdown) {
                    break;
                }
                controller.borrow_mut().handle(event);
            }
        });

        wasm_bindgen_futures::spawn_local(poll::poll_loop(
            status_url,
            interval,
            self.events.clone(),
            self.stopped.clone(),
        ));
    }

    /// Check for HLS support again after the client reported none
    pub fn recheck(&self) -> bool {
        self.controller.borrow_mut().recheck_capability()
    }

    /// Stop polling, drop the session and cancel any retry
    pub fn destroy(&mut self) {
        self.stopped.set(true);
        self.controller.borrow_mut().teardown();
        self.events.send(PlayerEvent::Shutdown);
    }

    /// "starting", "live" or "offline"
    pub fn phase(&self) -> String {
        self.controller.borrow().phase().to_string()
    }

    /// Audience size while live
    pub fn viewers(&self) -> Option<u32> {
        self.controller.borrow().viewers()
    }
}

impl OnAirPlayer {
    fn build(video_id: &str, status_id: &str, viewers_id: &str, config: PlayerConfig) -> Result<OnAirPlayer, JsValue> {
        config.validate().map_err(to_js)?;

        let video: HtmlVideoElement = element(video_id)?
            .dyn_into()
            .map_err(|_| JsValue::from_str(&format!("#{} is not a <video> element", video_id)))?;
        let status = element(status_id)?;
        let viewers = element(viewers_id).ok();

        let (tx, rx) = mpsc::unbounded();
        let events: Arc<dyn EventSink> = Arc::new(ChannelSink(tx));

        let adapter = FallbackAdapter::new(
            HlsJsEngine,
            VideoSink::new(video),
            config.engine.clone(),
            config.native_mime_type.clone(),
        );
        let controller = LifecycleController::new(
            config,
            Box::new(adapter),
            Box::new(DomIndicator::new(status, viewers)),
            Box::new(BrowserRetryTimer::new(events.clone())),
            events.clone(),
        );

        Ok(OnAirPlayer {
            controller: Rc::new(RefCell::new(controller)),
            events,
            receiver: Some(rx),
            stopped: Rc::new(Cell::new(false)),
        })
    }
}
