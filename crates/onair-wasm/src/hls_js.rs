//! hls.js engine
//!
//! Binds the `Hls` global loaded by the page. Nothing here works without the
//! hls.js script; a missing global reads as "engine not supported".

use crate::sink::VideoSink;
use onair_core::{EngineSession, EngineTuning, Error, PlaybackEngine, Result, SessionHandlers, SessionId, SessionKind};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlMediaElement;

/// `Hls.Events.MANIFEST_PARSED`
const MANIFEST_PARSED: &str = "hlsManifestParsed";
/// `Hls.Events.ERROR`
const ERROR: &str = "hlsError";

#[wasm_bindgen]
extern "C" {
    pub type Hls;

    #[wasm_bindgen(static_method_of = Hls, js_name = isSupported, catch)]
    fn is_supported() -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(constructor, catch)]
    fn new(config: &JsValue) -> std::result::Result<Hls, JsValue>;

    #[wasm_bindgen(method, js_name = loadSource)]
    fn load_source(this: &Hls, url: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    fn attach_media(this: &Hls, media: &HtmlMediaElement);

    #[wasm_bindgen(method)]
    fn on(this: &Hls, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method)]
    fn destroy(this: &Hls);

    #[wasm_bindgen(method, getter)]
    fn media(this: &Hls) -> Option<HtmlMediaElement>;
}

/// Constructor options in hls.js naming
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HlsJsConfig {
    enable_worker: bool,
    low_latency_mode: bool,
    back_buffer_length: f64,
    live_sync_duration_count: u32,
    live_max_latency_duration_count: u32,
}

impl From<&EngineTuning> for HlsJsConfig {
    fn from(tuning: &EngineTuning) -> Self {
        Self {
            enable_worker: tuning.enable_worker,
            low_latency_mode: tuning.low_latency_mode,
            back_buffer_length: tuning.back_buffer_length,
            live_sync_duration_count: tuning.live_sync_duration_count,
            live_max_latency_duration_count: tuning.live_max_latency_duration_count,
        }
    }
}

/// Text for a JS exception
pub(crate) fn js_error(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", value))
}

fn read_field(data: &JsValue, name: &str) -> JsValue {
    js_sys::Reflect::get(data, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED)
}

/// hls.js as a playback engine
#[derive(Default)]
pub struct HlsJsEngine;

impl PlaybackEngine for HlsJsEngine {
    type Sink = VideoSink;

    fn name(&self) -> &'static str {
        "hls.js"
    }

    fn is_supported(&self) -> bool {
        Hls::is_supported().unwrap_or(false)
    }

    fn load(
        &mut self,
        tuning: &EngineTuning,
        source: &str,
        sink: &mut VideoSink,
        handlers: SessionHandlers,
    ) -> Result<Box<dyn EngineSession>> {
        let config = serde_wasm_bindgen::to_value(&HlsJsConfig::from(tuning))
            .map_err(|e| Error::engine(e.to_string()))?;
        let hls = Hls::new(&config).map_err(|e| Error::engine(js_error(&e)))?;

        let on_manifest = {
            let handlers = handlers.clone();
            Closure::<dyn FnMut()>::new(move || handlers.manifest_parsed())
        };
        let on_error = {
            let handlers = handlers.clone();
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_event: JsValue, data: JsValue| {
                if read_field(&data, "fatal").as_bool() == Some(true) {
                    let details = read_field(&data, "details")
                        .as_string()
                        .unwrap_or_else(|| "unknown".to_string());
                    handlers.fatal_error(details);
                }
            })
        };

        hls.on(MANIFEST_PARSED, on_manifest.as_ref().unchecked_ref());
        hls.on(ERROR, on_error.as_ref().unchecked_ref());
        hls.load_source(source);
        hls.attach_media(sink.element());

        Ok(Box::new(HlsJsSession {
            id: handlers.session(),
            hls: Some(hls),
            _callbacks: (on_manifest, on_error),
        }))
    }
}

/// One `Hls` instance and the callbacks registered on it
pub struct HlsJsSession {
    id: SessionId,
    hls: Option<Hls>,
    _callbacks: (Closure<dyn FnMut()>, Closure<dyn FnMut(JsValue, JsValue)>),
}

impl EngineSession for HlsJsSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Engine
    }

    fn has_media(&self) -> bool {
        self.hls.as_ref().is_some_and(|hls| hls.media().is_some())
    }

    fn destroy(&mut self) {
        if let Some(hls) = self.hls.take() {
            hls.destroy();
        }
    }
}

impl Drop for HlsJsSession {
    // The callbacks die with the session, hls.js must not call them afterwards
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uses_hls_js_names() {
        let config = HlsJsConfig::from(&EngineTuning::default());
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["enableWorker"], true);
        assert_eq!(json["lowLatencyMode"], false);
        assert_eq!(json["backBufferLength"], 300.0);
        assert_eq!(json["liveSyncDurationCount"], 5);
        assert_eq!(json["liveMaxLatencyDurationCount"], 10);
    }
}
