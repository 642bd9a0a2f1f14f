//! Watchcast daemon
//!
//! Serves filesystem change events under a watched root to WebSocket
//! clients.
//!
//! # Usage
//!
//! ```bash
//! watchcastd --port 1234 --path .
//! watchcastd --hostname 0.0.0.0 --port 8080 --path /srv/site
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use watchcast::{serve, LifecycleEvent, ServeOptions, WatchFailurePolicy};

/// Watchcast daemon
#[derive(Parser, Debug)]
#[command(name = "watchcastd")]
#[command(about = "Broadcast filesystem change events to WebSocket clients")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "1234")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Path to watch recursively
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Keep serving connections even when the watch cannot be established
    #[arg(long)]
    degraded: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("watchcast=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let options = ServeOptions {
        hostname: args.hostname,
        port: args.port,
        path: args.path,
        on_event: Arc::new(log_event),
        watch_failure: if args.degraded {
            WatchFailurePolicy::Degraded
        } else {
            WatchFailurePolicy::FailFast
        },
    };

    let server = serve(options).await?;
    tracing::info!("connect with a WebSocket client to receive change events");

    tokio::signal::ctrl_c().await?;
    server.close().await?;
    Ok(())
}

fn log_event(event: LifecycleEvent) {
    match event {
        LifecycleEvent::Start { url } => tracing::info!("listening on {url}"),
        LifecycleEvent::Stop => tracing::info!("stopped"),
        LifecycleEvent::Connect { count } => {
            tracing::info!("client connected ({count} open)");
        }
        LifecycleEvent::Disconnect { count } => {
            tracing::info!("client disconnected ({count} open)");
        }
        LifecycleEvent::Fs { kind, paths } => {
            tracing::debug!(?kind, ?paths, "filesystem change");
        }
        LifecycleEvent::Error { message } => tracing::error!("{message}"),
    }
}
