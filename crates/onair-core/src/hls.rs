//! Headless HLS engine
//!
//! Stands in for the browser engine on native targets: it loads the
//! manifest, reports manifest parsed, then keeps refreshing the media
//! playlist and raises a fatal error when the stream stops being playable.
//! No media is decoded; [`HeadlessSink`] only counts play requests.
//!
//! Fatal conditions:
//! - the initial manifest load fails
//! - `max_refresh_failures` refreshes fail in a row
//! - the media sequence stops advancing for
//!   `live_max_latency_duration_count` target durations
//! - the playlist ends (`#EXT-X-ENDLIST`)

use crate::{
    config::EngineTuning,
    engine::{EngineSession, MediaSink, PlayRejected, PlaybackEngine},
    event::SessionHandlers,
    Error, Result, SessionId, SessionKind,
};
use m3u8_rs::{MediaPlaylist, Playlist};
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Playlist-watching engine
pub struct HlsPlaylistEngine {
    client: Client,
    enabled: bool,
    max_refresh_failures: u32,
}

impl HlsPlaylistEngine {
    pub fn new(timeout: Duration, max_refresh_failures: u32) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, max_refresh_failures))
    }

    pub fn with_client(client: Client, max_refresh_failures: u32) -> Self {
        Self {
            client,
            enabled: true,
            max_refresh_failures: max_refresh_failures.max(1),
        }
    }

    /// Make the feature check fail, forcing the native path
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl PlaybackEngine for HlsPlaylistEngine {
    type Sink = HeadlessSink;

    fn name(&self) -> &'static str {
        "hls-playlist"
    }

    fn is_supported(&self) -> bool {
        self.enabled
    }

    #[instrument(skip(self, tuning, sink, handlers), fields(session = %handlers.session()))]
    fn load(
        &mut self,
        tuning: &EngineTuning,
        source: &str,
        sink: &mut HeadlessSink,
        handlers: SessionHandlers,
    ) -> Result<Box<dyn EngineSession>> {
        let url = Url::parse(source)?;
        sink.attach();

        let watcher = PlaylistWatcher {
            client: self.client.clone(),
            url,
            tuning: tuning.clone(),
            max_refresh_failures: self.max_refresh_failures,
            handlers: handlers.clone(),
        };
        let task = tokio::spawn(watcher.run());

        Ok(Box::new(PlaylistSession {
            id: handlers.session(),
            attached: true,
            task,
        }))
    }
}

/// Session handle for one watcher task
pub struct PlaylistSession {
    id: SessionId,
    attached: bool,
    task: JoinHandle<()>,
}

impl EngineSession for PlaylistSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Engine
    }

    fn has_media(&self) -> bool {
        self.attached
    }

    fn destroy(&mut self) {
        if std::mem::replace(&mut self.attached, false) {
            debug!(session = %self.id, "Stopping playlist watcher");
        }
        self.task.abort();
    }
}

/// Sink without a decoder
#[derive(Debug, Default)]
pub struct HeadlessSink {
    attaches: AtomicU64,
    plays: AtomicU64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self) {
        self.attaches.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of sessions attached so far
    pub fn attaches(&self) -> u64 {
        self.attaches.load(Ordering::Relaxed)
    }

    /// Number of play requests received
    pub fn plays(&self) -> u64 {
        self.plays.load(Ordering::Relaxed)
    }
}

impl MediaSink for HeadlessSink {
    fn can_play_type(&self, _mime: &str) -> bool {
        false
    }

    fn attach_native(&mut self, _source: &str, _handlers: SessionHandlers) -> Result<Box<dyn EngineSession>> {
        Err(Error::NativePlayback("headless sink has no decoder".into()))
    }

    fn play(&mut self) -> std::result::Result<(), PlayRejected> {
        self.plays.fetch_add(1, Ordering::Relaxed);
        debug!("Play requested on headless sink");
        Ok(())
    }
}

struct PlaylistWatcher {
    client: Client,
    url: Url,
    tuning: EngineTuning,
    max_refresh_failures: u32,
    handlers: SessionHandlers,
}

impl PlaylistWatcher {
    async fn run(self) {
        let (media_url, playlist) = match self.load_initial().await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.handlers.fatal_error(format!("manifest load failed: {}", e));
                return;
            }
        };

        let mut window = LiveWindow::new(&self.tuning);
        window.update(&playlist);
        info!(
            url = %media_url,
            sequence = playlist.media_sequence,
            segments = playlist.segments.len(),
            "Manifest parsed"
        );
        self.handlers.manifest_parsed();

        if playlist.end_list {
            self.handlers.fatal_error("stream ended");
            return;
        }

        let mut failures = 0u32;
        loop {
            tokio::time::sleep(window.target_duration()).await;

            let playlist = match fetch_media(&self.client, &media_url).await {
                Ok(playlist) => {
                    failures = 0;
                    playlist
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "Playlist refresh failed");
                    if failures >= self.max_refresh_failures {
                        self.handlers.fatal_error(format!("playlist refresh failed: {}", e));
                        return;
                    }
                    continue;
                }
            };

            match window.update(&playlist) {
                WindowUpdate::Advanced { new_segments } => debug!(
                    new_segments,
                    playhead = window.playhead(),
                    buffered = window.len(),
                    "Live edge advanced"
                ),
                WindowUpdate::Unchanged => debug!(
                    refreshes = window.refreshes_without_progress(),
                    "Live edge unchanged"
                ),
                WindowUpdate::Stalled => {
                    self.handlers.fatal_error("live edge stalled");
                    return;
                }
            }

            if playlist.end_list {
                self.handlers.fatal_error("stream ended");
                return;
            }
        }
    }

    /// Load the manifest, following a master playlist to its first variant
    async fn load_initial(&self) -> Result<(Url, MediaPlaylist)> {
        let body = fetch_text(&self.client, &self.url).await?;
        match parse_playlist(&body)? {
            Playlist::MediaPlaylist(media) => Ok((self.url.clone(), media)),
            Playlist::MasterPlaylist(master) => {
                let variant = master
                    .variants
                    .iter()
                    .find(|v| !v.is_i_frame)
                    .ok_or_else(|| Error::engine("master playlist has no variants"))?;
                let media_url = self.url.join(&variant.uri)?;
                debug!(variant = %media_url, bandwidth = variant.bandwidth, "Following variant");
                let media = fetch_media(&self.client, &media_url).await?;
                Ok((media_url, media))
            }
        }
    }
}

async fn fetch_text(client: &Client, url: &Url) -> Result<String> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

async fn fetch_media(client: &Client, url: &Url) -> Result<MediaPlaylist> {
    let body = fetch_text(client, url).await?;
    match parse_playlist(&body)? {
        Playlist::MediaPlaylist(media) => Ok(media),
        Playlist::MasterPlaylist(_) => Err(Error::engine(format!("{} is a master playlist", url))),
    }
}

fn parse_playlist(body: &str) -> Result<Playlist> {
    m3u8_rs::parse_playlist_res(body.as_bytes())
        .map_err(|e| Error::engine(format!("failed to parse playlist: {:?}", e)))
}

/// Outcome of feeding a refreshed playlist into the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUpdate {
    /// New segments appeared at the live edge
    Advanced { new_segments: usize },
    /// Nothing new, still within the latency budget
    Unchanged,
    /// Nothing new for too long
    Stalled,
}

#[derive(Debug, Clone, Copy)]
struct BufferedSegment {
    sequence: u64,
    start: f64,
    duration: f64,
}

/// Sliding view of the live playlist
///
/// Keeps at most `back_buffer_length` seconds behind the playhead, which
/// sits `live_sync_duration_count` target durations behind the live edge.
#[derive(Debug)]
pub struct LiveWindow {
    back_buffer: f64,
    sync_count: u32,
    max_latency_count: u32,
    target: Duration,
    segments: VecDeque<BufferedSegment>,
    stale_refreshes: u32,
}

impl LiveWindow {
    pub fn new(tuning: &EngineTuning) -> Self {
        Self {
            back_buffer: tuning.back_buffer_length,
            sync_count: tuning.live_sync_duration_count,
            max_latency_count: tuning.live_max_latency_duration_count.max(1),
            target: Duration::from_secs(6),
            segments: VecDeque::new(),
            stale_refreshes: 0,
        }
    }

    pub fn update(&mut self, playlist: &MediaPlaylist) -> WindowUpdate {
        let target = playlist.target_duration as f64;
        if target > 0.0 {
            self.target = Duration::from_secs_f64(target);
        }

        let newest = self.segments.back().map(|s| s.sequence);
        let mut next_start = self.segments.back().map(|s| s.start + s.duration).unwrap_or(0.0);
        let mut added = 0;

        for (idx, segment) in playlist.segments.iter().enumerate() {
            let sequence = playlist.media_sequence + idx as u64;
            if newest.is_some_and(|n| sequence <= n) {
                continue;
            }
            let duration = segment.duration as f64;
            self.segments.push_back(BufferedSegment {
                sequence,
                start: next_start,
                duration,
            });
            next_start += duration;
            added += 1;
        }

        self.trim();

        if added > 0 {
            self.stale_refreshes = 0;
            WindowUpdate::Advanced { new_segments: added }
        } else {
            self.stale_refreshes += 1;
            if self.stale_refreshes >= self.max_latency_count {
                WindowUpdate::Stalled
            } else {
                WindowUpdate::Unchanged
            }
        }
    }

    /// Drop segments that fell out of the back buffer
    fn trim(&mut self) {
        let floor = self.playhead() - self.back_buffer;
        while let Some(front) = self.segments.front() {
            if front.start + front.duration < floor {
                self.segments.pop_front();
            } else {
                break;
            }
        }
    }

    /// Newest playable position
    pub fn live_edge(&self) -> f64 {
        self.segments.back().map(|s| s.start + s.duration).unwrap_or(0.0)
    }

    /// Position playback syncs to
    pub fn playhead(&self) -> f64 {
        let earliest = self.segments.front().map(|s| s.start).unwrap_or(0.0);
        let behind = self.sync_count as f64 * self.target.as_secs_f64();
        (self.live_edge() - behind).max(earliest)
    }

    pub fn target_duration(&self) -> Duration {
        self.target
    }

    pub fn refreshes_without_progress(&self) -> u32 {
        self.stale_refreshes
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineAdapter, FallbackAdapter, StartOutcome};
    use crate::event::{testing::RecordingSink, PlayerEvent};
    use crate::runtime::testing::TestServer;
    use std::sync::Arc;

    fn media_text(sequence: u64, segments: usize, ended: bool) -> String {
        let mut text = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXT-X-MEDIA-SEQUENCE:{}\n",
            sequence
        );
        for i in 0..segments {
            text.push_str(&format!("#EXTINF:2.0,\nseg{}.ts\n", sequence + i as u64));
        }
        if ended {
            text.push_str("#EXT-X-ENDLIST\n");
        }
        text
    }

    fn media(sequence: u64, segments: usize, ended: bool) -> MediaPlaylist {
        match parse_playlist(&media_text(sequence, segments, ended)).unwrap() {
            Playlist::MediaPlaylist(p) => p,
            Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        }
    }

    fn tuning(back_buffer: f64) -> EngineTuning {
        EngineTuning {
            back_buffer_length: back_buffer,
            live_sync_duration_count: 2,
            live_max_latency_duration_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_tracks_live_edge() {
        let mut window = LiveWindow::new(&tuning(300.0));

        assert_eq!(window.update(&media(10, 5, false)), WindowUpdate::Advanced { new_segments: 5 });
        assert_eq!(window.target_duration(), Duration::from_secs(2));
        assert_eq!(window.live_edge(), 10.0);
        assert_eq!(window.playhead(), 6.0);

        // Sliding playlist: 12..=16, two new segments
        assert_eq!(window.update(&media(12, 5, false)), WindowUpdate::Advanced { new_segments: 2 });
        assert_eq!(window.live_edge(), 14.0);
        assert_eq!(window.len(), 7);
    }

    #[test]
    fn test_window_detects_stall() {
        let mut window = LiveWindow::new(&tuning(300.0));
        window.update(&media(0, 3, false));

        assert_eq!(window.update(&media(0, 3, false)), WindowUpdate::Unchanged);
        assert_eq!(window.update(&media(0, 3, false)), WindowUpdate::Unchanged);
        assert_eq!(window.update(&media(0, 3, false)), WindowUpdate::Stalled);

        // Progress resets the budget
        let mut window = LiveWindow::new(&tuning(300.0));
        window.update(&media(0, 3, false));
        window.update(&media(0, 3, false));
        assert!(matches!(window.update(&media(1, 3, false)), WindowUpdate::Advanced { .. }));
        assert_eq!(window.refreshes_without_progress(), 0);
    }

    #[test]
    fn test_back_buffer_is_bounded() {
        let mut window = LiveWindow::new(&tuning(4.0));
        window.update(&media(0, 10, false));

        // Edge 20s, playhead 16s, keep segments ending at or after 12s
        assert_eq!(window.playhead(), 16.0);
        assert_eq!(window.len(), 5);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_parse_master_playlist() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nlow/index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\nhigh/index.m3u8\n";
        match parse_playlist(master).unwrap() {
            Playlist::MasterPlaylist(m) => {
                assert_eq!(m.variants.len(), 2);
                let base = Url::parse("http://localhost:8080/hls/stream.m3u8").unwrap();
                assert_eq!(
                    base.join(&m.variants[0].uri).unwrap().as_str(),
                    "http://localhost:8080/hls/low/index.m3u8"
                );
            }
            Playlist::MediaPlaylist(_) => panic!("expected master playlist"),
        }
    }

    #[test]
    fn test_ended_playlist_flag() {
        assert!(media(0, 2, true).end_list);
        assert!(!media(0, 2, false).end_list);
    }

    #[test]
    fn test_headless_sink_has_no_native_path() {
        let mut sink = HeadlessSink::new();
        assert!(!sink.can_play_type(crate::config::HLS_MIME_TYPE));
        assert!(sink.play().is_ok());
        assert_eq!(sink.plays(), 1);
    }

    #[tokio::test]
    async fn test_disabled_engine_leaves_headless_sink_unused() {
        let mut adapter = FallbackAdapter::new(
            HlsPlaylistEngine::with_client(Client::new(), 3).disabled(),
            HeadlessSink::new(),
            EngineTuning::default(),
            crate::config::HLS_MIME_TYPE,
        );
        let handlers = SessionHandlers::new(SessionId(1), Arc::new(RecordingSink::default()));

        assert!(matches!(
            adapter.start("http://localhost:8080/hls/stream.m3u8", handlers).unwrap(),
            StartOutcome::Unsupported
        ));
        assert_eq!(adapter.engine().name(), "hls-playlist");
        assert!(!adapter.engine().is_supported());
        assert_eq!(adapter.sink().attaches(), 0);
    }

    /// Load `path` from the server and collect events up to the first fatal error
    async fn watch(server: &TestServer, path: &str, max_refresh_failures: u32) -> Vec<PlayerEvent> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PlayerEvent>();
        let mut engine = HlsPlaylistEngine::with_client(Client::new(), max_refresh_failures);
        let mut sink = HeadlessSink::new();
        let handlers = SessionHandlers::new(SessionId(7), Arc::new(tx));

        let mut session = engine.load(&tuning(300.0), &server.url(path), &mut sink, handlers).unwrap();
        assert_eq!(sink.attaches(), 1);
        assert_eq!(sink.plays(), 0);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let fatal = matches!(event, PlayerEvent::FatalError { .. });
            events.push(event);
            if fatal {
                break;
            }
        }
        session.destroy();
        events
    }

    fn fatal_reason(event: &PlayerEvent) -> &str {
        match event {
            PlayerEvent::FatalError { session, reason } => {
                assert_eq!(*session, SessionId(7));
                reason
            }
            other => panic!("expected fatal error, got {:?}", other),
        }
    }

    fn assert_manifest_parsed(event: &PlayerEvent) {
        assert!(
            matches!(event, PlayerEvent::ManifestParsed { session } if *session == SessionId(7)),
            "expected manifest parsed, got {:?}",
            event
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_failure_is_fatal() {
        let server = TestServer::start(vec![]).await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 1);
        assert!(fatal_reason(&events[0]).starts_with("manifest load failed"));
        assert_eq!(server.hits("/hls/stream.m3u8"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_playlist_parses_then_ends() {
        let server = TestServer::start(vec![("/hls/stream.m3u8", vec![(200, media_text(40, 3, true))])]).await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 2);
        assert_manifest_parsed(&events[0]);
        assert_eq!(fatal_reason(&events[1]), "stream ended");
        assert_eq!(server.hits("/hls/stream.m3u8"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_playlist_follows_first_variant() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nlow/index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\nhigh/index.m3u8\n";
        let server = TestServer::start(vec![
            ("/hls/stream.m3u8", vec![(200, master.to_string())]),
            ("/hls/low/index.m3u8", vec![(200, media_text(0, 3, true))]),
        ])
        .await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 2);
        assert_manifest_parsed(&events[0]);
        assert_eq!(fatal_reason(&events[1]), "stream ended");
        assert_eq!(server.hits("/hls/low/index.m3u8"), 1);
        assert_eq!(server.hits("/hls/high/index.m3u8"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failures_up_to_limit_are_fatal() {
        // First load succeeds, every refresh after it returns 500
        let server = TestServer::start(vec![(
            "/hls/stream.m3u8",
            vec![(200, media_text(0, 3, false)), (500, String::new())],
        )])
        .await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 2);
        assert_manifest_parsed(&events[0]);
        assert!(fatal_reason(&events[1]).starts_with("playlist refresh failed"));
        assert_eq!(server.hits("/hls/stream.m3u8"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_below_limit_recovers() {
        let server = TestServer::start(vec![(
            "/hls/stream.m3u8",
            vec![
                (200, media_text(0, 3, false)),
                (500, String::new()),
                (500, String::new()),
                (200, media_text(1, 3, false)),
                (200, media_text(2, 3, true)),
            ],
        )])
        .await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 2);
        assert_manifest_parsed(&events[0]);
        assert_eq!(fatal_reason(&events[1]), "stream ended");
        assert_eq!(server.hits("/hls/stream.m3u8"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_playlist_stalls() {
        let server = TestServer::start(vec![("/hls/stream.m3u8", vec![(200, media_text(5, 3, false))])]).await;

        let events = watch(&server, "/hls/stream.m3u8", 3).await;

        assert_eq!(events.len(), 2);
        assert_manifest_parsed(&events[0]);
        assert_eq!(fatal_reason(&events[1]), "live edge stalled");
        // Initial load plus three refreshes without progress
        assert_eq!(server.hits("/hls/stream.m3u8"), 4);
    }
}
