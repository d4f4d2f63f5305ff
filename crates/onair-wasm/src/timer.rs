//! `setTimeout` clocks for the retry and the poll loop

use onair_core::{EventSink, PlayerEvent, RetryTimer, RetryToken, TimerUnavailable};
use std::sync::Arc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

fn millis(delay: Duration) -> i32 {
    i32::try_from(delay.as_millis()).unwrap_or(i32::MAX)
}

struct Pending {
    token: RetryToken,
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

/// Retry timer on `window.setTimeout`
pub struct BrowserRetryTimer {
    events: Arc<dyn EventSink>,
    pending: Option<Pending>,
}

impl BrowserRetryTimer {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events, pending: None }
    }

    fn clear(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(pending.handle);
            }
        }
    }
}

impl RetryTimer for BrowserRetryTimer {
    fn schedule(&mut self, delay: Duration, token: RetryToken) -> Result<(), TimerUnavailable> {
        self.clear();
        let window = web_sys::window().ok_or_else(|| TimerUnavailable("no window".into()))?;

        let events = self.events.clone();
        let callback = Closure::once(move || events.send(PlayerEvent::RetryFired(token)));
        let handle = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), millis(delay))
            .map_err(|e| TimerUnavailable(format!("setTimeout failed: {:?}", e)))?;
        self.pending = Some(Pending {
            token,
            handle,
            _callback: callback,
        });
        Ok(())
    }

    fn cancel(&mut self, token: RetryToken) {
        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            self.clear();
        }
    }
}

impl Drop for BrowserRetryTimer {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Resolve after `delay`
pub async fn sleep(delay: Duration) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis(delay));
        }
    });
    let _ = JsFuture::from(promise).await;
}
