//! Turns periodic engine property samples into [`BackendUpdate`]s.
//!
//! mpv accepts `loadfile` before it has opened anything, so a bad path or a
//! dead stream is only visible afterwards: the engine drops back to idle
//! without ever having played. A load that reaches idle before any position
//! was reported is a fault; one that reaches idle after playing has finished.

use super::backend::BackendUpdate;

/// Idle samples tolerated after a load before it is declared failed.
///
/// The engine can still report idle for a moment after `loadfile` returns.
const OPEN_GRACE_SAMPLES: u32 = 2;

/// One reading of the engine's observable properties.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct EngineSample {
    /// `path` is set (media is opening or open).
    pub has_path: bool,
    /// `idle-active`: nothing is loaded.
    pub idle: bool,
    /// `time-pos`, once decoding has started.
    pub position: Option<f64>,
    /// `duration`, when the container reports one.
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Phase {
    #[default]
    Unloaded,
    /// Waiting for the engine to open the media.
    Opening { idle_samples: u32 },
    /// Path observed; `played` once a position has been reported.
    Open { played: bool },
}

/// Tracks one load from `loadfile` to finish or failure.
#[derive(Debug, Default)]
pub(crate) struct LoadTracker {
    phase: Phase,
    reference: Option<String>,
}

impl LoadTracker {
    /// Starts tracking a new load, replacing any previous one.
    pub fn loading(&mut self, reference: &str) {
        self.phase = Phase::Opening { idle_samples: 0 };
        self.reference = Some(reference.to_string());
    }

    /// Forgets the current load (stop, shutdown or rejected `loadfile`).
    pub fn unloaded(&mut self) {
        self.phase = Phase::Unloaded;
        self.reference = None;
    }

    /// Applies one sample and returns the updates it implies.
    pub fn observe(&mut self, sample: EngineSample) -> Vec<BackendUpdate> {
        let mut updates = Vec::new();

        if sample.has_path {
            let played = matches!(self.phase, Phase::Open { played: true });
            if self.phase != Phase::Unloaded {
                self.phase = Phase::Open { played };
            }
        }

        if let Some(position) = sample.position {
            if let Phase::Open { played } = &mut self.phase {
                *played = true;
            }
            updates.push(BackendUpdate::Progress {
                position,
                duration: sample.duration,
            });
        }

        if !sample.idle {
            return updates;
        }

        match self.phase {
            Phase::Unloaded => {}
            Phase::Opening { idle_samples } => {
                let idle_samples = idle_samples + 1;
                if idle_samples >= OPEN_GRACE_SAMPLES {
                    updates.push(self.fail());
                } else {
                    self.phase = Phase::Opening { idle_samples };
                }
            }
            Phase::Open { played: true } => {
                self.unloaded();
                updates.push(BackendUpdate::Finished);
            }
            Phase::Open { played: false } => updates.push(self.fail()),
        }

        updates
    }

    fn fail(&mut self) -> BackendUpdate {
        let reason = match self.reference.take() {
            Some(reference) => format!("failed to open '{}'", reference),
            None => "failed to open media".to_string(),
        };
        self.unloaded();
        BackendUpdate::Fault(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> EngineSample {
        EngineSample {
            idle: true,
            ..Default::default()
        }
    }

    fn opening() -> EngineSample {
        EngineSample {
            has_path: true,
            ..Default::default()
        }
    }

    fn playing(position: f64) -> EngineSample {
        EngineSample {
            has_path: true,
            idle: false,
            position: Some(position),
            duration: Some(180.0),
        }
    }

    #[test]
    fn idle_without_load_reports_nothing() {
        let mut tracker = LoadTracker::default();
        assert!(tracker.observe(idle()).is_empty());
        assert!(tracker.observe(idle()).is_empty());
    }

    #[test]
    fn missing_file_becomes_fault_after_grace() {
        let mut tracker = LoadTracker::default();
        tracker.loading("/nope.mp3");

        assert!(tracker.observe(idle()).is_empty());
        assert_eq!(
            tracker.observe(idle()),
            vec![BackendUpdate::Fault("failed to open '/nope.mp3'".into())]
        );
        // Reported once only.
        assert!(tracker.observe(idle()).is_empty());
    }

    #[test]
    fn path_seen_then_idle_without_playing_is_fault() {
        let mut tracker = LoadTracker::default();
        tracker.loading("http://dead.example/stream");

        assert!(tracker.observe(opening()).is_empty());
        let updates = tracker.observe(idle());
        assert!(
            matches!(updates.as_slice(), [BackendUpdate::Fault(r)] if r.contains("dead.example"))
        );
    }

    #[test]
    fn played_then_idle_is_finished() {
        let mut tracker = LoadTracker::default();
        tracker.loading("/music/a.mp3");

        assert_eq!(
            tracker.observe(playing(0.0)),
            vec![BackendUpdate::Progress {
                position: 0.0,
                duration: Some(180.0)
            }]
        );
        tracker.observe(playing(179.5));
        assert_eq!(tracker.observe(idle()), vec![BackendUpdate::Finished]);
        assert!(tracker.observe(idle()).is_empty());
    }

    #[test]
    fn slow_open_within_grace_still_plays() {
        let mut tracker = LoadTracker::default();
        tracker.loading("http://radio.example/live");

        assert!(tracker.observe(idle()).is_empty());
        assert!(tracker.observe(opening()).is_empty());
        assert_eq!(tracker.observe(playing(1.0)).len(), 1);
    }

    #[test]
    fn stop_clears_pending_load() {
        let mut tracker = LoadTracker::default();
        tracker.loading("/music/a.mp3");
        tracker.observe(playing(3.0));
        tracker.unloaded();

        assert!(tracker.observe(idle()).is_empty());
        assert!(tracker.observe(idle()).is_empty());
    }

    #[test]
    fn reload_resets_played_flag() {
        let mut tracker = LoadTracker::default();
        tracker.loading("/music/a.mp3");
        tracker.observe(playing(10.0));

        tracker.loading("/music/missing.mp3");
        tracker.observe(idle());
        let updates = tracker.observe(idle());
        assert!(
            matches!(updates.as_slice(), [BackendUpdate::Fault(r)] if r.contains("missing.mp3"))
        );
    }
}
