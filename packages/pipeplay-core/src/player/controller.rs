//! The single owner of playback state.
//!
//! # Concurrency design
//!
//! - Commands are serialised by `command_lock` (a tokio mutex held across the
//!   backend call). There is no queue bound; commands are human-paced.
//! - The published status lives in `RwLock<Arc<Tracked>>`. Writers build a new
//!   value and swap it in under the write lock, so readers observe either the
//!   old or the new snapshot, never a mix.
//! - Metadata lookups and backend progress run outside `command_lock`. Each
//!   carries the generation it was started under (`load_id` / `epoch`) and is
//!   dropped if a newer command has moved the status on.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendError, BackendUpdate, PlaybackBackend};
use super::types::{clamp_volume, Command, PlayerState, PlayerStatus, VolumeDirection};
use crate::config::AudioConfig;
use crate::error::{PlaybackError, PlaybackResult};
use crate::metadata::MetadataSource;
use crate::protocol_constants::PROGRESS_POLL_INTERVAL;
use crate::runtime::TokioSpawner;

/// Status plus the generation counters used to reject stale async results.
#[derive(Debug, Clone)]
struct Tracked {
    status: PlayerStatus,
    /// Bumped whenever the loaded media changes (play, stop, end, failed load).
    load_id: u64,
    /// Bumped whenever the position is set by a command or the media changes.
    epoch: u64,
}

/// Atomically replaced status snapshot.
struct StatusCell {
    current: RwLock<Arc<Tracked>>,
}

impl StatusCell {
    fn new(status: PlayerStatus) -> Self {
        Self {
            current: RwLock::new(Arc::new(Tracked {
                status,
                load_id: 0,
                epoch: 0,
            })),
        }
    }

    fn load(&self) -> Arc<Tracked> {
        Arc::clone(&self.current.read())
    }

    /// Applies `f` to a copy of the current value and publishes the copy.
    fn update(&self, f: impl FnOnce(&mut Tracked)) -> PlayerStatus {
        let mut guard = self.current.write();
        let mut next = Tracked::clone(&guard);
        f(&mut next);
        let status = next.status.clone();
        *guard = Arc::new(next);
        status
    }

    /// Like [`update`](Self::update), but `f` may decline to publish anything.
    fn update_if(&self, f: impl FnOnce(&mut Tracked) -> bool) -> bool {
        let mut guard = self.current.write();
        let mut next = Tracked::clone(&guard);
        if !f(&mut next) {
            return false;
        }
        *guard = Arc::new(next);
        true
    }

    /// Applies a backend update. With `epoch` set, the update is discarded if
    /// a command has changed the position generation since it was sampled.
    fn apply_update(&self, epoch: Option<u64>, update: BackendUpdate) -> bool {
        self.update_if(|t| {
            if epoch.is_some_and(|e| e != t.epoch) {
                return false;
            }
            match update {
                BackendUpdate::Progress { position, duration } => {
                    if !t.status.state.has_media() {
                        return false;
                    }
                    if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
                        t.status.metadata.get_or_insert_with(Default::default).duration_seconds =
                            Some(d);
                    }
                    let mut position = position.max(t.status.position_seconds);
                    if let Some(d) = t.status.duration() {
                        position = position.min(d);
                    }
                    t.status.position_seconds = position.max(0.0);
                    true
                }
                BackendUpdate::Finished => {
                    if !t.status.state.has_media() {
                        return false;
                    }
                    log::info!(
                        "[Player] Finished: {}",
                        t.status.media_reference.as_deref().unwrap_or("?")
                    );
                    t.status.unload(PlayerState::Idle);
                    t.load_id += 1;
                    t.epoch += 1;
                    true
                }
                BackendUpdate::Fault(message) => {
                    log::error!("[Player] Backend fault: {}", message);
                    t.status.fail(message);
                    t.epoch += 1;
                    true
                }
            }
        })
    }

    /// Publishes resolved metadata if `reference` is still the loaded media.
    fn apply_metadata(&self, load_id: u64, reference: &str, mut resolved: super::MediaMetadata) -> bool {
        self.update_if(|t| {
            if t.load_id != load_id || t.status.media_reference.as_deref() != Some(reference) {
                return false;
            }
            // Duration reported by the backend wins over the tag value.
            if let Some(d) = t.status.duration() {
                resolved.duration_seconds = Some(d);
            }
            if let Some(d) = resolved.duration_seconds {
                t.status.position_seconds = t.status.position_seconds.min(d);
            }
            t.status.metadata = Some(resolved);
            true
        })
    }
}

/// Maps external commands onto the backend and owns the status snapshot.
pub struct PlayerController {
    backend: Arc<dyn PlaybackBackend>,
    metadata: Arc<dyn MetadataSource>,
    cell: Arc<StatusCell>,
    command_lock: tokio::sync::Mutex<()>,
    volume_step: f64,
    spawner: TokioSpawner,
}

impl PlayerController {
    /// Creates a controller in the `idle` state.
    ///
    /// # Arguments
    /// * `backend` - Native playback engine
    /// * `metadata` - Tag source consulted after every successful `Play`
    /// * `audio` - Initial volume and relative volume step
    /// * `spawner` - Runtime used for metadata lookups and the progress poller
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        metadata: Arc<dyn MetadataSource>,
        audio: &AudioConfig,
        spawner: TokioSpawner,
    ) -> Self {
        Self {
            backend,
            metadata,
            cell: Arc::new(StatusCell::new(PlayerStatus::idle(audio.default_volume))),
            command_lock: tokio::sync::Mutex::new(()),
            volume_step: audio.volume_step,
            spawner,
        }
    }

    /// Pushes the initial volume to the backend.
    ///
    /// # Errors
    /// Returns the backend failure; the player state is left untouched.
    pub async fn initialize(&self) -> PlaybackResult<()> {
        let _guard = self.command_lock.lock().await;
        let volume = self.cell.load().status.volume;
        self.backend.set_volume(volume).await?;
        log::info!("[Player] Initialised (volume {:.2})", volume);
        Ok(())
    }

    /// Non-blocking snapshot read.
    #[must_use]
    pub fn current_status(&self) -> PlayerStatus {
        self.cell.load().status.clone()
    }

    /// Whether the backend renders audio and will report the end of media.
    #[must_use]
    pub fn outputs_audio(&self) -> bool {
        self.backend.outputs_audio()
    }

    /// Applies one command, serialised against all other commands.
    ///
    /// Transitions that the current state does not support (`Pause` while not
    /// playing, `Resume` while not paused, `Stop` with nothing loaded) return
    /// the current status unchanged.
    ///
    /// # Errors
    /// - [`PlaybackError::InvalidCommand`] if validation fails (no backend call)
    /// - [`PlaybackError::Unsupported`] for seeks on unseekable or absent media
    /// - [`PlaybackError::BackendFault`] if the backend fails; the player is
    ///   then in the `error` state
    pub async fn execute(&self, command: Command) -> PlaybackResult<PlayerStatus> {
        command.validate()?;

        let _guard = self.command_lock.lock().await;
        let before = self.cell.load();
        let state = before.status.state;
        log::debug!("[Player] {} (state: {})", command.name(), state);

        match command {
            Command::Play {
                reference,
                media_type,
            } => self.play(reference, media_type).await,

            Command::Pause => {
                if state != PlayerState::Playing {
                    return Ok(before.status.clone());
                }
                self.call(self.backend.set_paused(true).await, |t| {
                    t.status.state = PlayerState::Paused;
                })
            }

            Command::Resume => {
                if state != PlayerState::Paused {
                    return Ok(before.status.clone());
                }
                self.call(self.backend.set_paused(false).await, |t| {
                    t.status.state = PlayerState::Playing;
                })
            }

            Command::Stop => {
                if !state.has_media() {
                    return Ok(before.status.clone());
                }
                self.call(self.backend.stop().await, |t| {
                    t.status.unload(PlayerState::Stopped);
                    t.load_id += 1;
                    t.epoch += 1;
                })
            }

            Command::SetVolume { level } => self.set_volume(clamp_volume(level)).await,

            Command::StepVolume { direction } => {
                let delta = match direction {
                    VolumeDirection::Up => self.volume_step,
                    VolumeDirection::Down => -self.volume_step,
                };
                self.set_volume(clamp_volume(before.status.volume + delta))
                    .await
            }

            Command::Mute { on } => self.call(self.backend.set_muted(on).await, |t| {
                t.status.muted = on;
            }),

            Command::Seek { offset } => {
                if !state.has_media() {
                    return Err(PlaybackError::Unsupported(format!(
                        "cannot seek while {}",
                        state
                    )));
                }
                match self.backend.is_seekable().await {
                    Ok(true) => {}
                    Ok(false) => {
                        return Err(PlaybackError::Unsupported(
                            "current media is not seekable".into(),
                        ))
                    }
                    Err(e) => return Err(self.fault(e)),
                }
                let target = before
                    .status
                    .duration()
                    .map_or(offset, |d| offset.min(d));
                self.call(self.backend.seek(target).await, |t| {
                    t.status.position_seconds = target;
                    t.epoch += 1;
                })
            }
        }
    }

    /// Entry point for changes originating in the backend (progress, end of
    /// media, faults). Replaces the snapshot atomically.
    pub fn apply_update(&self, update: BackendUpdate) {
        self.cell.apply_update(None, update);
    }

    /// Starts sampling the backend every [`PROGRESS_POLL_INTERVAL`] until
    /// `cancel` fires.
    pub fn start_progress_updates(&self, cancel: CancellationToken) {
        let backend = Arc::clone(&self.backend);
        let cell = Arc::clone(&self.cell);

        self.spawner.spawn(async move {
            let mut ticker = tokio::time::interval(PROGRESS_POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let epoch = cell.load().epoch;
                        for update in backend.poll() {
                            cell.apply_update(Some(epoch), update);
                        }
                    }
                }
            }
            log::debug!("[Player] Progress updates stopped");
        });
    }

    /// Stops playback and releases the backend.
    pub async fn shutdown(&self) {
        let _guard = self.command_lock.lock().await;
        self.backend.shutdown().await;
    }

    async fn play(&self, reference: String, media_type: String) -> PlaybackResult<PlayerStatus> {
        if let Err(e) = self.backend.load(&reference).await {
            log::error!("[Player] Failed to load {}: {}", reference, e);
            self.cell.update(|t| {
                t.status.unload(PlayerState::Error);
                t.status.fail(e.to_string());
                t.load_id += 1;
                t.epoch += 1;
            });
            return Err(e.into());
        }

        log::info!("[Player] Playing {} ({})", reference, media_type);
        let mut load_id = 0;
        let status = self.cell.update(|t| {
            t.load_id += 1;
            t.epoch += 1;
            load_id = t.load_id;
            t.status.state = PlayerState::Playing;
            t.status.media_reference = Some(reference.clone());
            t.status.media_type = Some(media_type);
            t.status.metadata = None;
            t.status.position_seconds = 0.0;
            t.status.error_message = None;
        });

        self.spawn_metadata_lookup(reference, load_id);
        Ok(status)
    }

    async fn set_volume(&self, level: f64) -> PlaybackResult<PlayerStatus> {
        self.call(self.backend.set_volume(level).await, |t| {
            t.status.volume = level;
        })
    }

    /// Publishes `apply` on success, or records a fault on failure.
    fn call(
        &self,
        result: Result<(), BackendError>,
        apply: impl FnOnce(&mut Tracked),
    ) -> PlaybackResult<PlayerStatus> {
        match result {
            Ok(()) => Ok(self.cell.update(apply)),
            Err(e) => Err(self.fault(e)),
        }
    }

    fn fault(&self, err: BackendError) -> PlaybackError {
        log::error!("[Player] Backend fault: {}", err);
        let message = err.to_string();
        self.cell.update(|t| {
            t.status.fail(message);
            t.epoch += 1;
        });
        err.into()
    }

    fn spawn_metadata_lookup(&self, reference: String, load_id: u64) {
        let source = Arc::clone(&self.metadata);
        let cell = Arc::clone(&self.cell);
        let blocking = self.spawner.clone();

        self.spawner.spawn(async move {
            let lookup = reference.clone();
            let resolved = match blocking.spawn_blocking(move || source.resolve(&lookup)).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("[Player] Metadata lookup for {} panicked: {}", reference, e);
                    return;
                }
            };

            if !cell.apply_metadata(load_id, &reference, resolved) {
                log::debug!("[Player] Discarding stale metadata for {}", reference);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::player::{BackendResult, MediaMetadata};

    /// Mock backend recording calls and failing on demand.
    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<String>>,
        failing: Mutex<HashSet<&'static str>>,
        unseekable: AtomicBool,
        pending: Mutex<Vec<BackendUpdate>>,
    }

    impl MockBackend {
        fn record(&self, op: &'static str, detail: String) -> BackendResult<()> {
            self.calls.lock().push(format!("{}:{}", op, detail));
            if self.failing.lock().contains(op) {
                Err(BackendError::Command(format!("{} exploded", op)))
            } else {
                Ok(())
            }
        }

        fn fail_on(&self, op: &'static str) {
            self.failing.lock().insert(op);
        }

        fn heal(&self) {
            self.failing.lock().clear();
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl PlaybackBackend for MockBackend {
        async fn load(&self, reference: &str) -> BackendResult<()> {
            self.record("load", reference.to_string())
        }
        async fn set_paused(&self, paused: bool) -> BackendResult<()> {
            self.record("pause", paused.to_string())
        }
        async fn stop(&self) -> BackendResult<()> {
            self.record("stop", String::new())
        }
        async fn set_volume(&self, level: f64) -> BackendResult<()> {
            self.record("volume", level.to_string())
        }
        async fn set_muted(&self, muted: bool) -> BackendResult<()> {
            self.record("mute", muted.to_string())
        }
        async fn seek(&self, position: f64) -> BackendResult<()> {
            self.record("seek", position.to_string())
        }
        async fn is_seekable(&self) -> BackendResult<bool> {
            Ok(!self.unseekable.load(Ordering::SeqCst))
        }
        fn poll(&self) -> Vec<BackendUpdate> {
            std::mem::take(&mut *self.pending.lock())
        }
        async fn shutdown(&self) {}
    }

    /// Resolver returning a fixed title derived from the reference.
    struct TitleResolver;

    impl MetadataSource for TitleResolver {
        fn resolve(&self, reference: &str) -> MediaMetadata {
            MediaMetadata {
                title: Some(format!("title of {}", reference)),
                ..Default::default()
            }
        }
    }

    /// Resolver that blocks on "slow" references until released.
    struct GatedResolver {
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl MetadataSource for GatedResolver {
        fn resolve(&self, reference: &str) -> MediaMetadata {
            if reference.contains("slow") {
                let _ = self.gate.lock().recv();
            }
            MediaMetadata {
                title: Some(reference.to_string()),
                ..Default::default()
            }
        }
    }

    fn controller_with(
        backend: Arc<MockBackend>,
        metadata: Arc<dyn MetadataSource>,
    ) -> PlayerController {
        PlayerController::new(
            backend,
            metadata,
            &AudioConfig::default(),
            TokioSpawner::current(),
        )
    }

    fn controller(backend: Arc<MockBackend>) -> PlayerController {
        controller_with(backend, Arc::new(TitleResolver))
    }

    async fn wait_for(controller: &PlayerController, pred: impl Fn(&PlayerStatus) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !pred(&controller.current_status()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn starts_idle_with_configured_volume() {
        let player = controller(Arc::new(MockBackend::default()));
        let status = player.current_status();
        assert_eq!(status.state, PlayerState::Idle);
        assert_eq!(status.volume, 0.5);
        assert!(status.media_reference.is_none());
        assert!(status.error_message.is_none());
        assert!(player.outputs_audio());
    }

    #[tokio::test]
    async fn play_enters_playing_and_resets_position() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());

        let status = player.execute(Command::play("/music/a.flac")).await.unwrap();
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.media_reference.as_deref(), Some("/music/a.flac"));
        assert_eq!(status.position_seconds, 0.0);
        assert!(status.error_message.is_none());
        assert_eq!(backend.calls.lock().as_slice(), ["load:/music/a.flac"]);

        wait_for(&player, |s| s.metadata.is_some()).await;
        assert_eq!(
            player.current_status().metadata.unwrap().title.as_deref(),
            Some("title of /music/a.flac")
        );
    }

    #[tokio::test]
    async fn invalid_command_never_reaches_backend() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());

        let err = player.execute(Command::play("  ")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidCommand(_)));
        let err = player
            .execute(Command::SetVolume { level: f64::NAN })
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidCommand(_)));
        assert_eq!(backend.call_count(), 0);
        assert_eq!(player.current_status(), PlayerStatus::idle(0.5));
    }

    #[tokio::test]
    async fn volume_is_clamped_in_every_state() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());

        for (input, expected) in [(1.7, 1.0), (-0.3, 0.0), (0.42, 0.42)] {
            let status = player
                .execute(Command::SetVolume { level: input })
                .await
                .unwrap();
            assert_eq!(status.volume, expected);
        }

        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.execute(Command::Pause).await.unwrap();
        let status = player
            .execute(Command::SetVolume { level: 3.0 })
            .await
            .unwrap();
        assert_eq!(status.volume, 1.0);
        assert_eq!(status.state, PlayerState::Paused);
    }

    #[tokio::test]
    async fn volume_steps_use_configured_step_and_clamp() {
        let player = controller(Arc::new(MockBackend::default()));
        let up = Command::StepVolume {
            direction: VolumeDirection::Up,
        };
        let status = player.execute(up.clone()).await.unwrap();
        assert!((status.volume - 0.6).abs() < 1e-9);

        player
            .execute(Command::SetVolume { level: 0.95 })
            .await
            .unwrap();
        assert_eq!(player.execute(up).await.unwrap().volume, 1.0);

        player
            .execute(Command::SetVolume { level: 0.05 })
            .await
            .unwrap();
        let down = Command::StepVolume {
            direction: VolumeDirection::Down,
        };
        assert_eq!(player.execute(down).await.unwrap().volume, 0.0);
    }

    #[tokio::test]
    async fn unsupported_transitions_are_no_ops() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());

        // idle
        for cmd in [Command::Pause, Command::Resume, Command::Stop] {
            let before = player.current_status();
            assert_eq!(player.execute(cmd).await.unwrap(), before);
        }
        assert_eq!(backend.call_count(), 0);

        // playing: resume is a no-op
        player.execute(Command::play("/a.mp3")).await.unwrap();
        wait_for(&player, |s| s.metadata.is_some()).await;
        let calls = backend.call_count();
        let before = player.current_status();
        assert_eq!(player.execute(Command::Resume).await.unwrap(), before);

        // paused: pause is a no-op
        player.execute(Command::Pause).await.unwrap();
        let before = player.current_status();
        assert_eq!(player.execute(Command::Pause).await.unwrap(), before);

        // stopped: all three are no-ops
        player.execute(Command::Stop).await.unwrap();
        for cmd in [Command::Pause, Command::Resume, Command::Stop] {
            let before = player.current_status();
            assert_eq!(player.execute(cmd).await.unwrap(), before);
        }
        assert_eq!(backend.call_count(), calls + 2);
    }

    #[tokio::test]
    async fn pause_resume_stop_cycle() {
        let player = controller(Arc::new(MockBackend::default()));
        player.execute(Command::play("/a.mp3")).await.unwrap();

        let status = player.execute(Command::Pause).await.unwrap();
        assert_eq!(status.state, PlayerState::Paused);

        let status = player.execute(Command::Resume).await.unwrap();
        assert_eq!(status.state, PlayerState::Playing);

        player.apply_update(BackendUpdate::Progress {
            position: 12.0,
            duration: Some(200.0),
        });
        let status = player.execute(Command::Stop).await.unwrap();
        assert_eq!(status.state, PlayerState::Stopped);
        assert_eq!(status.position_seconds, 0.0);
        assert!(status.media_reference.is_none());
    }

    #[tokio::test]
    async fn backend_fault_enters_error_and_play_recovers() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());
        player.execute(Command::play("/a.mp3")).await.unwrap();

        backend.fail_on("pause");
        let err = player.execute(Command::Pause).await.unwrap_err();
        assert!(matches!(err, PlaybackError::BackendFault(_)));
        let status = player.current_status();
        assert_eq!(status.state, PlayerState::Error);
        assert!(!status.error_message.unwrap().is_empty());

        backend.heal();
        let status = player.execute(Command::play("/b.mp3")).await.unwrap();
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.media_reference.as_deref(), Some("/b.mp3"));
        assert!(status.error_message.is_none());
    }

    #[tokio::test]
    async fn failed_load_enters_error() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_on("load");
        let player = controller(backend);

        let err = player.execute(Command::play("/a.mp3")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::BackendFault(ref m) if m.contains("load")));
        let status = player.current_status();
        assert_eq!(status.state, PlayerState::Error);
        assert!(status.error_message.is_some());
        assert!(status.media_reference.is_none());
    }

    #[tokio::test]
    async fn mute_toggle_preserves_volume() {
        let player = controller(Arc::new(MockBackend::default()));
        player
            .execute(Command::SetVolume { level: 0.73 })
            .await
            .unwrap();

        let muted = player.execute(Command::Mute { on: true }).await.unwrap();
        assert!(muted.muted);
        assert_eq!(muted.volume, 0.73);

        let unmuted = player.execute(Command::Mute { on: false }).await.unwrap();
        assert!(!unmuted.muted);
        assert_eq!(unmuted.volume, 0.73);
    }

    #[tokio::test]
    async fn seek_on_unseekable_media_is_unsupported() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());
        player
            .execute(Command::play("http://radio.example/live"))
            .await
            .unwrap();
        player.apply_update(BackendUpdate::Progress {
            position: 4.0,
            duration: None,
        });

        backend.unseekable.store(true, Ordering::SeqCst);
        let err = player
            .execute(Command::Seek { offset: 30.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Unsupported(_)));

        let status = player.current_status();
        assert_eq!(status.position_seconds, 4.0);
        assert_eq!(status.state, PlayerState::Playing);
        assert!(!backend.calls.lock().iter().any(|c| c.starts_with("seek")));
    }

    #[tokio::test]
    async fn seek_without_media_is_unsupported() {
        let player = controller(Arc::new(MockBackend::default()));
        let err = player
            .execute(Command::Seek { offset: 1.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Unsupported(_)));
        assert_eq!(player.current_status().state, PlayerState::Idle);
    }

    #[tokio::test]
    async fn seek_clamps_to_known_duration() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());
        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.apply_update(BackendUpdate::Progress {
            position: 1.0,
            duration: Some(60.0),
        });

        let status = player
            .execute(Command::Seek { offset: 90.0 })
            .await
            .unwrap();
        assert_eq!(status.position_seconds, 60.0);
        assert!(backend.calls.lock().contains(&"seek:60".to_string()));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_bounded() {
        let player = controller(Arc::new(MockBackend::default()));

        // Ignored while idle
        player.apply_update(BackendUpdate::Progress {
            position: 5.0,
            duration: None,
        });
        assert_eq!(player.current_status().position_seconds, 0.0);

        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.apply_update(BackendUpdate::Progress {
            position: 10.0,
            duration: Some(20.0),
        });
        player.apply_update(BackendUpdate::Progress {
            position: 8.0,
            duration: Some(20.0),
        });
        assert_eq!(player.current_status().position_seconds, 10.0);

        player.apply_update(BackendUpdate::Progress {
            position: 25.0,
            duration: Some(20.0),
        });
        let status = player.current_status();
        assert_eq!(status.position_seconds, 20.0);
        assert_eq!(status.duration(), Some(20.0));
    }

    #[tokio::test]
    async fn finished_returns_to_idle() {
        let player = controller(Arc::new(MockBackend::default()));
        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.apply_update(BackendUpdate::Finished);

        let status = player.current_status();
        assert_eq!(status.state, PlayerState::Idle);
        assert!(status.media_reference.is_none());
        assert_eq!(status.position_seconds, 0.0);
    }

    #[tokio::test]
    async fn backend_reported_fault_enters_error() {
        let player = controller(Arc::new(MockBackend::default()));
        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.apply_update(BackendUpdate::Fault("audio device lost".into()));

        let status = player.current_status();
        assert_eq!(status.state, PlayerState::Error);
        assert_eq!(status.error_message.as_deref(), Some("audio device lost"));
    }

    #[tokio::test]
    async fn stale_progress_sample_is_discarded_after_seek() {
        let player = controller(Arc::new(MockBackend::default()));
        player.execute(Command::play("/a.mp3")).await.unwrap();
        player.apply_update(BackendUpdate::Progress {
            position: 50.0,
            duration: Some(100.0),
        });

        let sampled_epoch = player.cell.load().epoch;
        player
            .execute(Command::Seek { offset: 5.0 })
            .await
            .unwrap();

        let applied = player.cell.apply_update(
            Some(sampled_epoch),
            BackendUpdate::Progress {
                position: 50.5,
                duration: Some(100.0),
            },
        );
        assert!(!applied);
        assert_eq!(player.current_status().position_seconds, 5.0);
    }

    #[tokio::test]
    async fn progress_poller_applies_backend_updates() {
        let backend = Arc::new(MockBackend::default());
        let player = controller(backend.clone());
        player.execute(Command::play("/a.mp3")).await.unwrap();

        backend.pending.lock().push(BackendUpdate::Progress {
            position: 3.0,
            duration: Some(10.0),
        });
        let cancel = CancellationToken::new();
        player.start_progress_updates(cancel.clone());

        wait_for(&player, |s| s.position_seconds == 3.0).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn stale_metadata_does_not_overwrite_newer_media() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let resolver = Arc::new(GatedResolver {
            gate: Mutex::new(release_rx),
        });
        let player = controller_with(Arc::new(MockBackend::default()), resolver);

        player.execute(Command::play("/slow.mp3")).await.unwrap();
        player.execute(Command::play("/fast.mp3")).await.unwrap();
        wait_for(&player, |s| s.metadata.is_some()).await;

        release_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = player.current_status();
        assert_eq!(status.media_reference.as_deref(), Some("/fast.mp3"));
        assert_eq!(
            status.metadata.unwrap().title.as_deref(),
            Some("/fast.mp3")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commands_never_publish_torn_snapshots() {
        let backend = Arc::new(MockBackend::default());
        backend.fail_on("pause");
        let player = Arc::new(controller(backend));

        let reader = {
            let player = Arc::clone(&player);
            tokio::spawn(async move {
                for _ in 0..2000 {
                    let s = player.current_status();
                    assert_eq!(s.error_message.is_some(), s.state == PlayerState::Error);
                    if s.state == PlayerState::Playing {
                        assert!(s.media_reference.is_some());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut writers = Vec::new();
        for i in 0..8 {
            let player = Arc::clone(&player);
            writers.push(tokio::spawn(async move {
                for j in 0..25 {
                    let cmd = match (i + j) % 5 {
                        0 => Command::play(format!("/track-{}-{}.mp3", i, j)),
                        1 => Command::Pause,
                        2 => Command::Resume,
                        3 => Command::SetVolume {
                            level: j as f64 / 25.0,
                        },
                        _ => Command::Stop,
                    };
                    let _ = player.execute(cmd).await;
                }
            }));
        }

        for w in writers {
            w.await.unwrap();
        }
        reader.await.unwrap();

        let s = player.current_status();
        assert_eq!(s.error_message.is_some(), s.state == PlayerState::Error);
    }
}
