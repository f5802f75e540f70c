//! libmpv-backed playback engine.
//!
//! Audio only: video output is disabled and the player idles between files.
//! mpv's `loadfile` is asynchronous, so end of media and failed opens are
//! both detected from polled properties by a [`LoadTracker`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use libmpv2::Mpv;
use parking_lot::Mutex;

use super::backend::{BackendError, BackendResult, BackendUpdate, PlaybackBackend};
use super::load_tracker::{EngineSample, LoadTracker};

/// Playback backend driving an embedded libmpv instance.
pub struct MpvBackend {
    mpv: Mutex<Mpv>,
    tracker: Mutex<LoadTracker>,
}

impl MpvBackend {
    /// Creates the mpv instance and applies user options.
    ///
    /// # Arguments
    /// * `options` - Extra mpv properties (`audio.mpv_options`), applied after
    ///   the built-in audio-only defaults so users can override them.
    ///
    /// # Errors
    /// Returns [`BackendError::Init`] if libmpv cannot be created or an
    /// option is rejected.
    pub fn new(options: &BTreeMap<String, String>) -> BackendResult<Self> {
        let mpv = Mpv::new().map_err(|e| BackendError::Init(e.to_string()))?;

        for (name, value) in [("vid", "no"), ("idle", "yes"), ("keep-open", "no")] {
            mpv.set_property(name, value)
                .map_err(|e| BackendError::Init(format!("{}={}: {}", name, value, e)))?;
        }

        for (name, value) in options {
            mpv.set_property(name.as_str(), value.as_str())
                .map_err(|e| BackendError::Init(format!("{}={}: {}", name, value, e)))?;
            log::debug!("[mpv] option {}={}", name, value);
        }

        log::info!("[mpv] Backend initialised");
        Ok(Self {
            mpv: Mutex::new(mpv),
            tracker: Mutex::new(LoadTracker::default()),
        })
    }

    fn command(&self, name: &str, args: &[&str]) -> BackendResult<()> {
        self.mpv
            .lock()
            .command(name, args)
            .map_err(|e| BackendError::Command(format!("mpv {} failed: {}", name, e)))
    }
}

#[async_trait]
impl PlaybackBackend for MpvBackend {
    async fn load(&self, reference: &str) -> BackendResult<()> {
        self.tracker.lock().loading(reference);
        if let Err(e) = self.command("loadfile", &[reference, "replace"]) {
            self.tracker.lock().unloaded();
            return Err(e);
        }
        self.mpv
            .lock()
            .set_property("pause", false)
            .map_err(|e| BackendError::Property {
                name: "pause",
                reason: e.to_string(),
            })
    }

    async fn set_paused(&self, paused: bool) -> BackendResult<()> {
        self.mpv
            .lock()
            .set_property("pause", paused)
            .map_err(|e| BackendError::Property {
                name: "pause",
                reason: e.to_string(),
            })
    }

    async fn stop(&self) -> BackendResult<()> {
        self.tracker.lock().unloaded();
        self.command("stop", &[])
    }

    async fn set_volume(&self, level: f64) -> BackendResult<()> {
        // mpv volume is a percentage
        self.mpv
            .lock()
            .set_property("volume", level * 100.0)
            .map_err(|e| BackendError::Property {
                name: "volume",
                reason: e.to_string(),
            })
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        self.mpv
            .lock()
            .set_property("mute", muted)
            .map_err(|e| BackendError::Property {
                name: "mute",
                reason: e.to_string(),
            })
    }

    async fn seek(&self, position: f64) -> BackendResult<()> {
        let target = position.to_string();
        self.command("seek", &[&target, "absolute"])
    }

    async fn is_seekable(&self) -> BackendResult<bool> {
        // Unavailable until the stream is opened; treat that as not seekable.
        Ok(self
            .mpv
            .lock()
            .get_property::<bool>("seekable")
            .unwrap_or(false))
    }

    fn poll(&self) -> Vec<BackendUpdate> {
        let sample = {
            let mpv = self.mpv.lock();
            EngineSample {
                has_path: mpv.get_property::<String>("path").is_ok(),
                idle: mpv.get_property::<bool>("idle-active").unwrap_or(false),
                position: mpv.get_property::<f64>("time-pos").ok(),
                duration: mpv.get_property::<f64>("duration").ok(),
            }
        };

        let updates = self.tracker.lock().observe(sample);
        for update in &updates {
            if let BackendUpdate::Fault(reason) = update {
                log::warn!("[mpv] {}", reason);
            }
        }
        updates
    }

    async fn shutdown(&self) {
        self.tracker.lock().unloaded();
        if let Err(e) = self.command("stop", &[]) {
            log::warn!("[mpv] Failed to stop during shutdown: {}", e);
        }
        log::info!("[mpv] Backend shut down");
    }
}
