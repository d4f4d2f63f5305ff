//! OnAir CLI - Headless live-stream watcher
//!
//! Features:
//! - Watch a stream with the full reconnection lifecycle
//! - One-shot liveness check of the status endpoint

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod indicator;
mod output;

/// OnAir CLI - Live stream toolkit
#[derive(Parser)]
#[command(name = "onair-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Watch a live stream and follow its reconnection lifecycle", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a live stream and keep it playing
    Watch {
        /// Base URL of the streaming server
        #[arg(short, long, env = "ONAIR_SERVER")]
        server: Option<String>,

        /// Manifest URL, overrides the configured source path
        #[arg(long)]
        source: Option<String>,

        /// Liveness URL, overrides the configured status path
        #[arg(long)]
        status: Option<String>,

        /// Player configuration (JSON)
        #[arg(short, long, env = "ONAIR_CONFIG")]
        config: Option<PathBuf>,

        /// Use the low-latency preset when no config file is given
        #[arg(long)]
        low_latency: bool,

        /// Seconds to watch (0 = until Ctrl-C)
        #[arg(short, long, default_value = "0")]
        duration: u64,

        /// Disable the playlist engine and go through the native check
        #[arg(long)]
        native_only: bool,
    },

    /// Query the liveness endpoint once
    Status {
        /// Base URL of the streaming server
        #[arg(short, long, env = "ONAIR_SERVER")]
        server: Option<String>,

        /// Liveness URL, overrides the default status path
        #[arg(long)]
        status: Option<String>,

        /// Output format (text, json, table)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_tracing(verbose: bool, log_format: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log_format {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, &cli.log_format);
    onair_core::init();

    match cli.command {
        Commands::Watch {
            server,
            source,
            status,
            config,
            low_latency,
            duration,
            native_only,
        } => {
            let options = commands::WatchOptions {
                server,
                source,
                status,
                config,
                low_latency,
                duration,
                native_only,
            };
            commands::watch(options).await?;
        }
        Commands::Status { server, status, format } => {
            commands::status(server.as_deref(), status.as_deref(), &format).await?;
        }
    }

    Ok(())
}
