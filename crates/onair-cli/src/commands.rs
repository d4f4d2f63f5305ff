//! CLI command implementations

use crate::indicator::ConsoleIndicator;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Context};
use onair_core::{
    FallbackAdapter, HeadlessSink, HlsPlaylistEngine, HttpLivenessSource, LivenessSource,
    PlayerConfig, PlayerRuntime,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Flags of the `watch` command
pub struct WatchOptions {
    pub server: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub config: Option<PathBuf>,
    pub low_latency: bool,
    pub duration: u64,
    pub native_only: bool,
}

/// Absolute manifest and liveness URLs
#[derive(Debug, PartialEq)]
pub struct Endpoints {
    pub source: Url,
    pub status: Url,
}

/// Resolve a URL that may be relative to the server
fn resolve(base: Option<&Url>, raw: &str) -> anyhow::Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| anyhow!("'{}' is a relative URL, pass --server", raw))?;
            Ok(base.join(raw)?)
        }
        Err(e) => Err(e).with_context(|| format!("invalid URL '{}'", raw)),
    }
}

/// Work out both endpoints from flags and configured paths
pub fn resolve_endpoints(
    config: &PlayerConfig,
    server: Option<&str>,
    source: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<Endpoints> {
    let base = server
        .map(|s| Url::parse(s).with_context(|| format!("invalid server URL '{}'", s)))
        .transpose()?;

    Ok(Endpoints {
        source: resolve(base.as_ref(), source.unwrap_or(&config.source_url))?,
        status: resolve(base.as_ref(), status.unwrap_or(&config.status_url))?,
    })
}

/// Load the configuration the `watch` command runs with
fn load_config(options: &WatchOptions) -> anyhow::Result<PlayerConfig> {
    match &options.config {
        Some(path) => PlayerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None if options.low_latency => Ok(PlayerConfig::low_latency()),
        None => Ok(PlayerConfig::default()),
    }
}

/// Watch a live stream until Ctrl-C or the duration runs out
pub async fn watch(options: WatchOptions) -> anyhow::Result<()> {
    let mut config = load_config(&options)?;
    let endpoints = resolve_endpoints(
        &config,
        options.server.as_deref(),
        options.source.as_deref(),
        options.status.as_deref(),
    )?;
    config.source_url = endpoints.source.to_string();
    config.status_url = endpoints.status.to_string();

    println!("Watching: {}", endpoints.source);
    println!("  Status: {}", endpoints.status);
    println!(
        "  Duration: {}",
        if options.duration == 0 {
            "until Ctrl-C".to_string()
        } else {
            format!("{}s", options.duration)
        }
    );

    let mut engine = HlsPlaylistEngine::new(config.request_timeout(), config.max_refresh_failures)?;
    if options.native_only {
        engine = engine.disabled();
    }
    let adapter = FallbackAdapter::new(
        engine,
        HeadlessSink::new(),
        config.engine.clone(),
        config.native_mime_type.clone(),
    );
    let liveness = HttpLivenessSource::new(endpoints.status, config.request_timeout())?;

    let player = PlayerRuntime::new(
        config,
        Box::new(adapter),
        Box::new(ConsoleIndicator::new()),
        liveness,
    )?;

    let duration = options.duration;
    let shutdown = async move {
        if duration == 0 {
            let _ = tokio::signal::ctrl_c().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    };

    let controller = player.run_until(shutdown).await;
    info!(phase = %controller.phase(), "Watch finished");

    println!();
    println!("{}", output::stats_table(&controller.stats()));

    Ok(())
}

/// Query the liveness endpoint once and print the report
pub async fn status(server: Option<&str>, status: Option<&str>, format: &str) -> anyhow::Result<()> {
    let config = PlayerConfig::default();
    let base = server
        .map(|s| Url::parse(s).with_context(|| format!("invalid server URL '{}'", s)))
        .transpose()?;
    let url = resolve(base.as_ref(), status.unwrap_or(&config.status_url))?;

    let source = HttpLivenessSource::new(url, config.request_timeout())?;
    let report = source.fetch().await?;

    println!("{}", output::format_report(&report, OutputFormat::from(format))?);

    Ok(())
}
