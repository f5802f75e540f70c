//! PipePlay - network-controllable audio player.
//!
//! Runs the player with its HTTP API and DNS-SD advertisement. Without flags
//! it also reads commands from stdin; `--play` plays one reference and exits
//! when it ends; `--daemon` serves until signalled.

mod interactive;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use pipeplay_core::protocol_constants::PROGRESS_POLL_INTERVAL;
use pipeplay_core::{
    bootstrap_services, start_server, BootstrappedServices, Command, ConfigStore,
};
use tokio::signal;
use tokio::task::JoinHandle;

/// Time allowed for in-flight HTTP requests to drain on shutdown.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// PipePlay - network-controllable audio player.
#[derive(Parser, Debug)]
#[command(name = "pipeplay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (JSON).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace). Overrides the config file.
    #[arg(short, long, env = "PIPEPLAY_LOG_LEVEL")]
    log_level: Option<LevelFilter>,

    /// Play a path or URL, then exit when it finishes.
    #[arg(long, value_name = "REF", conflicts_with = "daemon")]
    play: Option<String>,

    /// Run the HTTP service without the interactive prompt.
    #[arg(long)]
    daemon: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Everything passes the logger; the effective level is set via max_level
    // once the config file has been read.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .format_timestamp_millis()
        .init();
    log::set_max_level(args.log_level.unwrap_or(LevelFilter::Info));

    log::info!("PipePlay v{}", env!("CARGO_PKG_VERSION"));

    let store = match args.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::new(
            ConfigStore::default_path()
                .context("No user config directory on this platform; pass --config")?,
        ),
    };
    let config = store.load().context("Failed to load configuration")?;

    if args.log_level.is_none() {
        log::set_max_level(config.logging.level.parse().unwrap_or(LevelFilter::Info));
    }
    log::info!(
        "Configuration: {} (api={}:{} enabled={} auth={} discovery={})",
        store.path().display(),
        config.api.host,
        config.api.port,
        config.api.enabled,
        config.auth_required(),
        config.discovery.enabled
    );

    let services = bootstrap_services(config)
        .await
        .context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let server_handle = spawn_server(&services);

    if let Some(reference) = args.play {
        tokio::select! {
            result = play_once(&services, reference) => result?,
            _ = shutdown_signal() => log::info!("Shutdown signal received"),
        }
    } else if args.daemon {
        shutdown_signal().await;
        log::info!("Shutdown signal received");
    } else {
        tokio::select! {
            result = interactive::run(services.player.clone()) => result?,
            _ = shutdown_signal() => log::info!("Shutdown signal received"),
        }
    }

    log::info!("Cleaning up...");
    services.shutdown().await;

    if let Some(handle) = server_handle {
        if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, handle).await.is_err() {
            log::warn!("HTTP server did not drain in time");
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Starts the HTTP API (and discovery) unless disabled in config.
fn spawn_server(services: &BootstrappedServices) -> Option<JoinHandle<()>> {
    if !services.config.api.enabled {
        log::info!("HTTP API disabled");
        return None;
    }

    let state = services.app_state();
    let cancel = services.cancel_token.child_token();
    Some(tokio::spawn(async move {
        if let Err(e) = start_server(state, cancel).await {
            log::error!("Server error: {}", e);
        }
    }))
}

/// Plays one reference and returns once it is no longer loaded.
///
/// Returns straight after the load when the backend renders no audio, since
/// such a backend never reports the end of media.
async fn play_once(services: &BootstrappedServices, reference: String) -> Result<()> {
    let status = services
        .player
        .execute(Command::play(reference))
        .await
        .context("Playback failed")?;
    println!("{}", interactive::format_status(&status));

    if !services.player.outputs_audio() {
        log::warn!("No audio backend in this build; not waiting for playback to end");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(PROGRESS_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        let status = services.player.current_status();
        if !status.state.has_media() {
            println!("{}", interactive::format_status(&status));
            return Ok(());
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
