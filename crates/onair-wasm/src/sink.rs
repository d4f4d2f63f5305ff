//! `<video>` element as the media sink

use crate::hls_js::js_error;
use onair_core::{EngineSession, Error, MediaSink, PlayRejected, Result, SessionHandlers, SessionId, SessionKind};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlMediaElement, HtmlVideoElement};

pub struct VideoSink {
    video: HtmlVideoElement,
}

impl VideoSink {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }

    pub fn element(&self) -> &HtmlMediaElement {
        self.video.as_ref()
    }
}

impl MediaSink for VideoSink {
    fn can_play_type(&self, mime: &str) -> bool {
        // "", "maybe" or "probably"
        !self.video.can_play_type(mime).is_empty()
    }

    fn attach_native(&mut self, source: &str, handlers: SessionHandlers) -> Result<Box<dyn EngineSession>> {
        let on_metadata = {
            let handlers = handlers.clone();
            Closure::<dyn FnMut()>::new(move || handlers.manifest_parsed())
        };
        let on_error = {
            let handlers = handlers.clone();
            Closure::<dyn FnMut()>::new(move || handlers.fatal_error("media element error"))
        };

        self.video
            .add_event_listener_with_callback("loadedmetadata", on_metadata.as_ref().unchecked_ref())
            .map_err(|e| Error::NativePlayback(js_error(&e)))?;
        self.video
            .add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())
            .map_err(|e| Error::NativePlayback(js_error(&e)))?;
        self.video.set_src(source);

        Ok(Box::new(NativeSession {
            id: handlers.session(),
            video: self.video.clone(),
            on_metadata,
            on_error,
            attached: true,
        }))
    }

    fn play(&mut self) -> std::result::Result<(), PlayRejected> {
        let promise = self.video.play().map_err(|e| PlayRejected(js_error(&e)))?;
        // Autoplay refusals arrive as a rejected promise, nothing to do about them
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                web_sys::console::debug_1(&format!("[OnAir] play() rejected: {}", js_error(&e)).into());
            }
        });
        Ok(())
    }
}

/// Native playback on the element, with its two listeners
pub struct NativeSession {
    id: SessionId,
    video: HtmlVideoElement,
    on_metadata: Closure<dyn FnMut()>,
    on_error: Closure<dyn FnMut()>,
    attached: bool,
}

impl EngineSession for NativeSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Native
    }

    fn has_media(&self) -> bool {
        self.attached
    }

    fn destroy(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        let _ = self
            .video
            .remove_event_listener_with_callback("loadedmetadata", self.on_metadata.as_ref().unchecked_ref());
        let _ = self
            .video
            .remove_event_listener_with_callback("error", self.on_error.as_ref().unchecked_ref());
        let _ = self.video.remove_attribute("src");
        self.video.load();
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.destroy();
    }
}
