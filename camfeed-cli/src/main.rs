//! Camfeed CLI
//!
//! Command-line watcher for a Nest camera's cloud feeds.
//!
//! # Usage
//!
//! ```bash
//! # Fetch the latest snapshot once and write it to ./snapshots
//! camfeed snapshot
//!
//! # Follow the motion/sound event feed, logging each event
//! camfeed watch
//!
//! # Also write every polled snapshot to disk while watching
//! camfeed watch --with-snapshots
//! ```
//!
//! Secrets are taken from flags or the `CAMFEED_*` environment variables;
//! the library itself never reads the environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use camfeed_core::feed::{FeedHub, FeedOptions};
use camfeed_core::{ApiConfig, CredentialStore, ResourceClient, TokenExchanger};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod writer;

use writer::SnapshotWriter;

#[derive(Parser)]
#[command(name = "camfeed")]
#[command(about = "Watch a Nest camera's snapshot and event feeds")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ApiArgs {
    /// Vendor API key for the session token exchange
    #[arg(long, env = "CAMFEED_API_KEY", hide_env_values = true)]
    api_key: String,

    /// OAuth client id
    #[arg(long, env = "CAMFEED_CLIENT_ID")]
    client_id: String,

    /// Long-lived OAuth refresh token
    #[arg(long, env = "CAMFEED_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: String,

    /// Identifier of the camera to watch
    #[arg(long, env = "CAMFEED_CAMERA_ID")]
    camera_id: String,

    /// Snapshot poll interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    snapshot_interval_ms: u64,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 3000)]
    event_interval_ms: u64,

    /// Stop a feed after this many consecutive failed polls
    #[arg(long)]
    failure_threshold: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest snapshot once and write it to disk
    Snapshot {
        /// Directory snapshots are written into
        #[arg(short, long, default_value = "snapshots")]
        output: PathBuf,
    },

    /// Follow the motion/sound event feed
    Watch {
        /// Also poll the snapshot feed and write each frame to disk
        #[arg(long)]
        with_snapshots: bool,

        /// Directory snapshots are written into
        #[arg(short, long, default_value = "snapshots")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ApiConfig::new(
        &cli.api.api_key,
        &cli.api.client_id,
        &cli.api.refresh_token,
        &cli.api.camera_id,
    );

    let credentials = Arc::new(CredentialStore::new(TokenExchanger::new(config.clone())));
    let resource = Arc::new(ResourceClient::new(config, credentials));

    match cli.command {
        Commands::Snapshot { output } => snapshot_once(resource, output).await,
        Commands::Watch {
            with_snapshots,
            output,
        } => {
            let options = FeedOptions {
                snapshot_interval: Duration::from_millis(cli.api.snapshot_interval_ms),
                event_interval: Duration::from_millis(cli.api.event_interval_ms),
                failure_threshold: cli.api.failure_threshold,
                ..FeedOptions::default()
            };
            watch(FeedHub::with_options(resource, options), with_snapshots, output).await
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn snapshot_once(resource: Arc<ResourceClient>, output: PathBuf) -> Result<()> {
    let image = resource
        .fetch_latest_snapshot()
        .await
        .context("failed to fetch the latest snapshot")?;

    let writer = SnapshotWriter::new(output);
    let path = writer.write("latest", &image).await?;

    info!("snapshot written to {:?}", path);
    Ok(())
}

async fn watch(hub: FeedHub, with_snapshots: bool, output: PathBuf) -> Result<()> {
    let mut events = hub.subscribe_events();

    let snapshot_task = with_snapshots.then(|| {
        let mut snapshots = hub.subscribe_snapshots();
        let writer = SnapshotWriter::new(output);
        tokio::spawn(async move {
            while let Some(item) = snapshots.recv().await {
                match item {
                    Ok(image) => match writer.write("poll", &image).await {
                        Ok(path) => info!("snapshot written to {:?}", path),
                        Err(err) => error!("snapshot write failed: {err:#}"),
                    },
                    Err(err) => warn!("snapshot feed: {err}"),
                }
            }
        })
    });

    info!("watching for camera events, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            item = events.recv() => match item {
                Some(Ok(event)) => info!("camera event: {}", event.as_json()),
                Some(Err(err)) => warn!("event feed: {err}"),
                None => {
                    warn!("event feed stopped");
                    break;
                }
            },
        }
    }

    if let Some(task) = snapshot_task {
        task.abort();
    }

    Ok(())
}
