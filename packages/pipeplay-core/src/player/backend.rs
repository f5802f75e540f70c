//! Trait abstraction for the native playback engine.
//!
//! The controller depends on [`PlaybackBackend`] rather than on libmpv, so the
//! player model can be exercised without a sound device and the binary can be
//! built without the native library.

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors reported by a playback backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be created or configured.
    #[error("backend initialisation failed: {0}")]
    Init(String),

    /// A command sent to the backend was rejected.
    #[error("{0}")]
    Command(String),

    /// A property could not be read or written.
    #[error("property '{name}' unavailable: {reason}")]
    Property { name: &'static str, reason: String },
}

/// Convenient Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// A change originating inside the backend rather than from a command.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendUpdate {
    /// Current playback position and (when known) total duration, in seconds.
    Progress {
        position: f64,
        duration: Option<f64>,
    },
    /// The loaded media played to its end.
    Finished,
    /// Unrecoverable playback fault.
    Fault(String),
}

/// Native audio playback engine.
///
/// Implementations are called by one command at a time (the controller
/// serialises commands), but [`poll`](Self::poll) may run concurrently with a
/// command.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Loads a path or URL and starts playing it, replacing current media.
    async fn load(&self, reference: &str) -> BackendResult<()>;

    /// Pauses (`true`) or resumes (`false`) the loaded media.
    async fn set_paused(&self, paused: bool) -> BackendResult<()>;

    /// Stops playback and unloads the media.
    async fn stop(&self) -> BackendResult<()>;

    /// Sets output volume.
    ///
    /// # Arguments
    /// * `level` - Volume in `[0.0, 1.0]` (already clamped by the caller)
    async fn set_volume(&self, level: f64) -> BackendResult<()>;

    /// Sets the mute flag without touching the volume level.
    async fn set_muted(&self, muted: bool) -> BackendResult<()>;

    /// Seeks to an absolute position in seconds.
    async fn seek(&self, position: f64) -> BackendResult<()>;

    /// Whether the loaded media supports seeking (live streams usually don't).
    async fn is_seekable(&self) -> BackendResult<bool>;

    /// Samples state that changes on its own (position, end of media).
    fn poll(&self) -> Vec<BackendUpdate>;

    /// Whether loaded media is actually rendered.
    ///
    /// A backend returning `false` never reports progress or end of media, so
    /// callers must not wait for playback to finish.
    fn outputs_audio(&self) -> bool {
        true
    }

    /// Releases native resources. Called once at process shutdown.
    async fn shutdown(&self);
}

/// Returns true for references with a URL scheme (`http://`, `rtsp://`, ...).
#[must_use]
pub fn is_network_reference(reference: &str) -> bool {
    match reference.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && scheme != "file"
        }
        None => false,
    }
}

/// Backend that accepts every command without producing audio.
///
/// Used when the binary is built without the `mpv` feature. Network references
/// are treated as live streams and reported as non-seekable.
#[derive(Debug, Default)]
pub struct NullBackend {
    loaded: Mutex<Option<String>>,
}

impl NullBackend {
    /// Creates a new `NullBackend`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlaybackBackend for NullBackend {
    async fn load(&self, reference: &str) -> BackendResult<()> {
        log::debug!("[NullBackend] load {}", reference);
        *self.loaded.lock() = Some(reference.to_string());
        Ok(())
    }

    async fn set_paused(&self, _paused: bool) -> BackendResult<()> {
        Ok(())
    }

    async fn stop(&self) -> BackendResult<()> {
        *self.loaded.lock() = None;
        Ok(())
    }

    async fn set_volume(&self, _level: f64) -> BackendResult<()> {
        Ok(())
    }

    async fn set_muted(&self, _muted: bool) -> BackendResult<()> {
        Ok(())
    }

    async fn seek(&self, _position: f64) -> BackendResult<()> {
        Ok(())
    }

    async fn is_seekable(&self) -> BackendResult<bool> {
        Ok(self
            .loaded
            .lock()
            .as_deref()
            .is_some_and(|r| !is_network_reference(r)))
    }

    fn poll(&self) -> Vec<BackendUpdate> {
        Vec::new()
    }

    fn outputs_audio(&self) -> bool {
        false
    }

    async fn shutdown(&self) {
        *self.loaded.lock() = None;
    }
}
