//! Liveness polling with `fetch`

use crate::hls_js::js_error;
use crate::timer::sleep;
use onair_core::{EventSink, LivenessReport, PlayerEvent, PollError, PollOutcome};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

async fn fetch_status(url: &str) -> PollOutcome {
    let window = web_sys::window().ok_or_else(|| PollError::Network("no window".into()))?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| PollError::Network(js_error(&e)))?;
    let response: Response = response
        .dyn_into()
        .map_err(|_| PollError::Network("fetch did not return a Response".into()))?;

    if !response.ok() {
        return Err(PollError::Status(response.status()));
    }

    let text = response.text().map_err(|e| PollError::Network(js_error(&e)))?;
    let body = JsFuture::from(text)
        .await
        .map_err(|e| PollError::Network(js_error(&e)))?;

    LivenessReport::parse(&body.as_string().unwrap_or_default())
}

/// Poll forever, or until `stopped` is set
pub async fn poll_loop(url: String, interval: Duration, events: Arc<dyn EventSink>, stopped: Rc<Cell<bool>>) {
    while !stopped.get() {
        let outcome = fetch_status(&url).await;
        if stopped.get() {
            break;
        }
        events.send(PlayerEvent::Liveness(outcome));
        sleep(interval).await;
    }
}
