//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the
//! backend, resolver and controller are instantiated and wired together.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::config::{AudioConfig, Config};
use crate::context::{IpDetector, LocalIpDetector};
use crate::metadata::MetadataResolver;
use crate::player::{BackendResult, PlaybackBackend, PlayerController};
use crate::runtime::TokioSpawner;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// The single player instance for this process.
    pub player: Arc<PlayerController>,
    /// Effective configuration (file + environment overrides).
    pub config: Arc<Config>,
    pub ip_detector: Arc<dyn IpDetector>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Shared state for the HTTP layer.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState {
            player: Arc::clone(&self.player),
            config: Arc::clone(&self.config),
            ip_detector: Arc::clone(&self.ip_detector),
        }
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Stops the progress poller and the HTTP server
        self.cancel_token.cancel();

        self.player.shutdown().await;

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the playback backend for this build.
///
/// # Errors
/// Returns an error if the native backend cannot be initialised.
#[cfg(feature = "mpv")]
pub fn create_backend(audio: &AudioConfig) -> BackendResult<Arc<dyn PlaybackBackend>> {
    Ok(Arc::new(crate::player::MpvBackend::new(&audio.mpv_options)?))
}

/// Creates the playback backend for this build.
///
/// # Errors
/// Infallible without the `mpv` feature.
#[cfg(not(feature = "mpv"))]
pub fn create_backend(audio: &AudioConfig) -> BackendResult<Arc<dyn PlaybackBackend>> {
    if !audio.mpv_options.is_empty() {
        log::warn!("[Bootstrap] Built without mpv; ignoring audio.mpv_options");
    }
    log::warn!("[Bootstrap] Built without mpv; commands will not produce audio");
    Ok(Arc::new(crate::player::NullBackend::new()))
}

/// Bootstraps all services with their dependencies.
///
/// Wiring order:
/// 1. Playback backend (native library, may fail)
/// 2. Metadata resolver (cache sized from config)
/// 3. Player controller, initial volume pushed to the backend
/// 4. Progress poller, tied to the shutdown token
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
/// Returns an error if the playback backend fails to start.
pub async fn bootstrap_services(config: Config) -> BackendResult<BootstrappedServices> {
    let backend = create_backend(&config.audio)?;
    bootstrap_with_backend(config, backend).await
}

/// Like [`bootstrap_services`] with a caller-supplied backend.
pub async fn bootstrap_with_backend(
    config: Config,
    backend: Arc<dyn PlaybackBackend>,
) -> BackendResult<BootstrappedServices> {
    let cancel_token = CancellationToken::new();

    let cache_size = NonZeroUsize::new(config.metadata.cache_size).unwrap_or(NonZeroUsize::MIN);
    let resolver = Arc::new(MetadataResolver::new(cache_size));

    let player = Arc::new(PlayerController::new(
        backend,
        resolver,
        &config.audio,
        TokioSpawner::current(),
    ));

    if let Err(e) = player.initialize().await {
        log::warn!("[Bootstrap] Failed to apply initial volume: {}", e);
    }
    player.start_progress_updates(cancel_token.child_token());

    Ok(BootstrappedServices {
        player,
        config: Arc::new(config),
        ip_detector: LocalIpDetector::arc(),
        cancel_token,
    })
}
