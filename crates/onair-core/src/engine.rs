//! Engine Adapter - uniform start/attach/error/destroy contract
//!
//! Playback itself belongs to an external engine (hls.js in the browser, the
//! playlist watcher in [`crate::hls`] on native targets) or to the media
//! sink's own decoder. [`FallbackAdapter`] tries the engine first, then the
//! sink's native path, and reports [`StartOutcome::Unsupported`] when neither
//! can play the source.

use crate::{config::EngineTuning, event::SessionHandlers, Result, SessionId, SessionKind};
use tracing::{debug, info, instrument};

/// One live playback session
pub trait EngineSession {
    /// Session the handlers were registered for
    fn id(&self) -> SessionId;

    /// Engine or native path
    fn kind(&self) -> SessionKind;

    /// Whether the session is still attached to its media sink
    fn has_media(&self) -> bool;

    /// Release engine resources, detach from the sink, drop listeners.
    /// Calling it twice is harmless.
    fn destroy(&mut self);
}

/// Autoplay or similar refusal of a play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRejected(pub String);

impl std::fmt::Display for PlayRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "play request rejected: {}", self.0)
    }
}

/// The element media is rendered into
pub trait MediaSink {
    /// Native support check, `canPlayType` semantics
    fn can_play_type(&self, mime: &str) -> bool;

    /// Assign the source directly and watch metadata/error events
    fn attach_native(&mut self, source: &str, handlers: SessionHandlers) -> Result<Box<dyn EngineSession>>;

    /// Best-effort play request
    fn play(&mut self) -> std::result::Result<(), PlayRejected>;
}

/// External adaptive-streaming engine
pub trait PlaybackEngine {
    /// Sink type the engine attaches to
    type Sink: MediaSink;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Feature detection
    fn is_supported(&self) -> bool;

    /// Configure a new engine instance, register `handlers`, load `source`
    /// and attach `sink`
    fn load(
        &mut self,
        tuning: &EngineTuning,
        source: &str,
        sink: &mut Self::Sink,
        handlers: SessionHandlers,
    ) -> Result<Box<dyn EngineSession>>;
}

/// Result of a start attempt
pub enum StartOutcome {
    /// A session exists and its handlers are registered
    Started(Box<dyn EngineSession>),
    /// Neither the engine nor the native path can play the source
    Unsupported,
}

impl std::fmt::Debug for StartOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartOutcome::Started(session) => f
                .debug_tuple("Started")
                .field(&session.id())
                .field(&session.kind())
                .finish(),
            StartOutcome::Unsupported => f.write_str("Unsupported"),
        }
    }
}

/// Contract the lifecycle controller drives
pub trait EngineAdapter {
    /// Create a session for `source` with `handlers` registered.
    ///
    /// `Err` is a transient failure of a supported path; capability absence
    /// is `Ok(StartOutcome::Unsupported)`.
    fn start(&mut self, source: &str, handlers: SessionHandlers) -> Result<StartOutcome>;

    /// Best-effort play on the sink
    fn play(&mut self) -> std::result::Result<(), PlayRejected>;
}

/// Engine first, native sink second
pub struct FallbackAdapter<E: PlaybackEngine> {
    engine: E,
    sink: E::Sink,
    tuning: EngineTuning,
    native_mime: String,
}

impl<E: PlaybackEngine> FallbackAdapter<E> {
    pub fn new(engine: E, sink: E::Sink, tuning: EngineTuning, native_mime: impl Into<String>) -> Self {
        Self {
            engine,
            sink,
            tuning,
            native_mime: native_mime.into(),
        }
    }

    pub fn sink(&self) -> &E::Sink {
        &self.sink
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: PlaybackEngine> EngineAdapter for FallbackAdapter<E> {
    #[instrument(skip(self, handlers), fields(session = %handlers.session()))]
    fn start(&mut self, source: &str, handlers: SessionHandlers) -> Result<StartOutcome> {
        if self.engine.is_supported() {
            info!(engine = self.engine.name(), source, "Starting engine session");
            let session = self.engine.load(&self.tuning, source, &mut self.sink, handlers)?;
            return Ok(StartOutcome::Started(session));
        }

        debug!(engine = self.engine.name(), "Engine unsupported, probing native playback");

        if self.sink.can_play_type(&self.native_mime) {
            info!(source, mime = %self.native_mime, "Starting native session");
            let session = self.sink.attach_native(source, handlers)?;
            return Ok(StartOutcome::Started(session));
        }

        info!(mime = %self.native_mime, "No playback path available");
        Ok(StartOutcome::Unsupported)
    }

    fn play(&mut self) -> std::result::Result<(), PlayRejected> {
        self.sink.play()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable engine and sink used across the crate's tests

    use super::*;
    use crate::Error;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    };

    /// Shared log of what the fakes were asked to do
    #[derive(Clone, Default)]
    pub struct FakeLog {
        pub loads: Arc<Mutex<Vec<SessionId>>>,
        pub natives: Arc<Mutex<Vec<SessionId>>>,
        pub destroyed: Arc<Mutex<Vec<SessionId>>>,
        pub plays: Arc<Mutex<u32>>,
        pub handlers: Arc<Mutex<Vec<SessionHandlers>>>,
        pub attached: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    }

    impl FakeLog {
        pub fn loads(&self) -> Vec<SessionId> {
            self.loads.lock().unwrap().clone()
        }

        pub fn natives(&self) -> Vec<SessionId> {
            self.natives.lock().unwrap().clone()
        }

        pub fn destroyed(&self) -> Vec<SessionId> {
            self.destroyed.lock().unwrap().clone()
        }

        pub fn plays(&self) -> u32 {
            *self.plays.lock().unwrap()
        }

        /// Handlers of the most recent session
        pub fn last_handlers(&self) -> SessionHandlers {
            self.handlers.lock().unwrap().last().cloned().unwrap()
        }

        /// Simulate the media element losing every source
        pub fn detach_media(&self) {
            for attached in self.attached.lock().unwrap().iter() {
                attached.store(false, Ordering::SeqCst);
            }
        }

        fn session(&self, id: SessionId, kind: SessionKind) -> Box<dyn EngineSession> {
            let attached = Arc::new(AtomicBool::new(true));
            self.attached.lock().unwrap().push(attached.clone());
            Box::new(FakeSession { id, kind, attached, log: self.clone() })
        }
    }

    pub struct FakeSession {
        pub id: SessionId,
        pub kind: SessionKind,
        pub attached: Arc<AtomicBool>,
        pub log: FakeLog,
    }

    impl EngineSession for FakeSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn kind(&self) -> SessionKind {
            self.kind
        }

        fn has_media(&self) -> bool {
            self.attached.load(Ordering::SeqCst)
        }

        fn destroy(&mut self) {
            if self.attached.swap(false, Ordering::SeqCst) {
                self.log.destroyed.lock().unwrap().push(self.id);
            }
        }
    }

    pub struct FakeSink {
        pub native: bool,
        pub reject_play: bool,
        pub log: FakeLog,
    }

    impl MediaSink for FakeSink {
        fn can_play_type(&self, _mime: &str) -> bool {
            self.native
        }

        fn attach_native(&mut self, _source: &str, handlers: SessionHandlers) -> Result<Box<dyn EngineSession>> {
            let id = handlers.session();
            self.log.natives.lock().unwrap().push(id);
            self.log.handlers.lock().unwrap().push(handlers);
            Ok(self.log.session(id, SessionKind::Native))
        }

        fn play(&mut self) -> std::result::Result<(), PlayRejected> {
            *self.log.plays.lock().unwrap() += 1;
            if self.reject_play {
                Err(PlayRejected("NotAllowedError".into()))
            } else {
                Ok(())
            }
        }
    }

    /// How a scripted load fails
    #[derive(Clone, Copy)]
    pub enum LoadFailure {
        /// Engine constructor threw, worth retrying
        Transient,
        /// Source can never be loaded
        BadSource,
    }

    pub struct FakeEngine {
        pub supported: bool,
        pub fail_load: Option<LoadFailure>,
        pub log: FakeLog,
    }

    impl PlaybackEngine for FakeEngine {
        type Sink = FakeSink;

        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn load(
            &mut self,
            _tuning: &EngineTuning,
            _source: &str,
            _sink: &mut FakeSink,
            handlers: SessionHandlers,
        ) -> Result<Box<dyn EngineSession>> {
            match self.fail_load {
                Some(LoadFailure::Transient) => return Err(Error::engine("constructor threw")),
                Some(LoadFailure::BadSource) => return Err(Error::Url(url::ParseError::RelativeUrlWithoutBase)),
                None => {}
            }
            let id = handlers.session();
            self.log.loads.lock().unwrap().push(id);
            self.log.handlers.lock().unwrap().push(handlers);
            Ok(self.log.session(id, SessionKind::Engine))
        }
    }

    /// Adapter over the fakes
    pub fn adapter(engine: bool, native: bool) -> (FallbackAdapter<FakeEngine>, FakeLog) {
        let log = FakeLog::default();
        let adapter = FallbackAdapter::new(
            FakeEngine { supported: engine, fail_load: None, log: log.clone() },
            FakeSink { native, reject_play: false, log: log.clone() },
            EngineTuning::default(),
            crate::config::HLS_MIME_TYPE,
        );
        (adapter, log)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::adapter;
    use super::*;
    use crate::event::testing::RecordingSink;
    use std::sync::Arc;

    fn handlers(id: u64) -> SessionHandlers {
        SessionHandlers::new(SessionId(id), Arc::new(RecordingSink::default()))
    }

    #[test]
    fn test_engine_path_preferred() {
        let (mut adapter, log) = adapter(true, true);

        match adapter.start("/hls/stream.m3u8", handlers(1)).unwrap() {
            StartOutcome::Started(session) => {
                assert_eq!(session.kind(), SessionKind::Engine);
                assert_eq!(session.id(), SessionId(1));
            }
            StartOutcome::Unsupported => panic!("engine should be used"),
        }
        assert_eq!(log.loads(), vec![SessionId(1)]);
        assert!(log.natives().is_empty());
    }

    #[test]
    fn test_native_fallback() {
        let (mut adapter, log) = adapter(false, true);

        match adapter.start("/hls/stream.m3u8", handlers(1)).unwrap() {
            StartOutcome::Started(session) => assert_eq!(session.kind(), SessionKind::Native),
            StartOutcome::Unsupported => panic!("native path should be used"),
        }
        assert!(log.loads().is_empty());
        assert_eq!(log.natives(), vec![SessionId(1)]);
    }

    #[test]
    fn test_no_path_is_unsupported() {
        let (mut adapter, log) = adapter(false, false);

        assert!(matches!(
            adapter.start("/hls/stream.m3u8", handlers(1)).unwrap(),
            StartOutcome::Unsupported
        ));
        assert!(log.handlers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (mut adapter, log) = adapter(true, false);

        let StartOutcome::Started(mut session) = adapter.start("/s.m3u8", handlers(4)).unwrap() else {
            panic!("expected a session");
        };
        session.destroy();
        session.destroy();
        assert!(!session.has_media());
        assert_eq!(log.destroyed(), vec![SessionId(4)]);
    }
}
