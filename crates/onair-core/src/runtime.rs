//! Tokio driver for the lifecycle controller
//!
//! One task owns the controller and drains the event queue; the poller and
//! the retry timer are separate tasks that only ever send events.

use crate::{
    config::PlayerConfig,
    controller::LifecycleController,
    engine::EngineAdapter,
    event::{EventSink, PlayerEvent},
    indicator::StatusIndicator,
    poller::{LivenessSource, StatusPoller},
    retry::{RetryTimer, RetryToken, TimerUnavailable},
    Result,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Retry timer backed by a spawned `sleep`
pub struct TokioRetryTimer {
    events: UnboundedSender<PlayerEvent>,
    task: Option<(RetryToken, JoinHandle<()>)>,
}

impl TokioRetryTimer {
    pub fn new(events: UnboundedSender<PlayerEvent>) -> Self {
        Self { events, task: None }
    }
}

impl RetryTimer for TokioRetryTimer {
    fn schedule(&mut self, delay: Duration, token: RetryToken) -> std::result::Result<(), TimerUnavailable> {
        if let Some((old, handle)) = self.task.take() {
            debug!(token = %old, "Replacing retry task");
            handle.abort();
        }

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(PlayerEvent::RetryFired(token));
        });
        self.task = Some((token, handle));
        Ok(())
    }

    fn cancel(&mut self, token: RetryToken) {
        if self.task.as_ref().is_some_and(|(t, _)| *t == token) {
            if let Some((_, handle)) = self.task.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for TokioRetryTimer {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.task.take() {
            handle.abort();
        }
    }
}

/// Injects events into a running player
#[derive(Clone)]
pub struct PlayerHandle {
    events: UnboundedSender<PlayerEvent>,
}

impl PlayerHandle {
    pub fn send(&self, event: PlayerEvent) {
        EventSink::send(&self.events, event);
    }

    /// Ask the event loop to tear down and return
    pub fn shutdown(&self) {
        self.send(PlayerEvent::Shutdown);
    }
}

/// Controller, event queue and poller wired together
pub struct PlayerRuntime<S> {
    controller: LifecycleController,
    events_tx: UnboundedSender<PlayerEvent>,
    events_rx: UnboundedReceiver<PlayerEvent>,
    poller: StatusPoller<S>,
}

impl<S: LivenessSource + 'static> PlayerRuntime<S> {
    pub fn new(
        config: PlayerConfig,
        adapter: Box<dyn EngineAdapter>,
        indicator: Box<dyn StatusIndicator>,
        liveness: S,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn EventSink> = Arc::new(events_tx.clone());
        let timer = TokioRetryTimer::new(events_tx.clone());
        let poller = StatusPoller::new(liveness, config.poll_interval());
        let controller = LifecycleController::new(config, adapter, indicator, Box::new(timer), sink);

        Ok(Self {
            controller,
            events_tx,
            events_rx,
            poller,
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    /// Run until a `Shutdown` event arrives
    pub async fn run(self) -> LifecycleController {
        self.run_until(std::future::pending()).await
    }

    /// Start playback, poll, and process events until `shutdown` resolves or
    /// a `Shutdown` event arrives. Returns the torn-down controller.
    pub async fn run_until<F>(self, shutdown: F) -> LifecycleController
    where
        F: Future<Output = ()>,
    {
        let PlayerRuntime {
            mut controller,
            events_tx,
            mut events_rx,
            poller,
        } = self;

        let sink: Arc<dyn EventSink> = Arc::new(events_tx.clone());
        let poller_task = tokio::spawn(poller.run(sink));

        info!(source = %controller.config().source_url, "Player starting");
        controller.start();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(PlayerEvent::Shutdown) | None => break,
                    Some(event) => controller.handle(event),
                },
            }
        }

        poller_task.abort();
        controller.teardown();

        let stats = controller.stats();
        info!(
            start_attempts = stats.start_attempts,
            fatal_errors = stats.fatal_errors,
            retries_fired = stats.retries_fired,
            liveness_preemptions = stats.liveness_preemptions,
            "Player stopped"
        );
        controller
    }
}


/// Loopback HTTP server with canned responses
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Routes = Arc<Mutex<HashMap<String, VecDeque<(u16, String)>>>>;

    /// Serves each path its queued responses in order; the last one repeats.
    /// Unknown paths get a 404.
    pub struct TestServer {
        base: String,
        hits: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        pub async fn start(routes: Vec<(&str, Vec<(u16, String)>)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let routes: Routes = Arc::new(Mutex::new(
                routes
                    .into_iter()
                    .map(|(path, responses)| (path.to_string(), responses.into()))
                    .collect(),
            ));
            let hits = Arc::new(Mutex::new(Vec::new()));

            let server_hits = hits.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(respond(stream, routes.clone(), server_hits.clone()));
                }
            });

            Self { base, hits }
        }

        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        /// Requests received for `path` so far
        pub fn hits(&self, path: &str) -> usize {
            self.hits.lock().unwrap().iter().filter(|p| *p == path).count()
        }
    }

    async fn respond(mut stream: TcpStream, routes: Routes, hits: Arc<Mutex<Vec<String>>>) {
        let mut buf = vec![0u8; 8192];
        let mut read = 0;
        while read < buf.len() {
            match stream.read(&mut buf[read..]).await {
                Ok(0) | Err(_) => break,
                Ok(n) => read += n,
            }
            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let request = String::from_utf8_lossy(&buf[..read]);
        let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
        hits.lock().unwrap().push(path.clone());

        let (status, body) = {
            let mut routes = routes.lock().unwrap();
            match routes.get_mut(&path) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap_or((404, String::new())),
                None => (404, String::new()),
            }
        };

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }
}
