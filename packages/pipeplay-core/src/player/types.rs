//! Player data model: status snapshot, metadata, and the command set.

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, PlaybackResult};
use crate::protocol_constants::DEFAULT_MEDIA_TYPE;

/// Playback state of the single logical player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlayerState {
    /// Whether a media reference is currently loaded in the backend.
    #[must_use]
    pub fn has_media(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Best-effort descriptive tags for a media reference.
///
/// Every field is optional; an all-`None` value is the "nothing known" default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl MediaMetadata {
    /// Returns true when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.duration_seconds.is_none()
    }
}

/// Point-in-time snapshot of the player.
///
/// Snapshots are never mutated once published; every change produces a new
/// value that replaces the previous one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub media_reference: Option<String>,
    pub media_type: Option<String>,
    pub metadata: Option<MediaMetadata>,
    pub position_seconds: f64,
    pub volume: f64,
    pub muted: bool,
    /// Set if and only if `state == Error`.
    pub error_message: Option<String>,
}

impl PlayerStatus {
    /// Initial status at process start.
    #[must_use]
    pub fn idle(volume: f64) -> Self {
        Self {
            state: PlayerState::Idle,
            media_reference: None,
            media_type: None,
            metadata: None,
            position_seconds: 0.0,
            volume: clamp_volume(volume),
            muted: false,
            error_message: None,
        }
    }

    /// Known duration of the loaded media, if any.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.metadata.as_ref().and_then(|m| m.duration_seconds)
    }

    /// Clears the loaded media and rewinds, keeping volume and mute.
    pub(crate) fn unload(&mut self, state: PlayerState) {
        self.state = state;
        self.media_reference = None;
        self.media_type = None;
        self.metadata = None;
        self.position_seconds = 0.0;
        self.error_message = None;
    }

    /// Enters the error state. The message is never empty.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state = PlayerState::Error;
        self.error_message = Some(if message.trim().is_empty() {
            "unknown backend fault".to_string()
        } else {
            message
        });
    }
}

/// Clamps a volume level into `[0.0, 1.0]`.
#[must_use]
pub fn clamp_volume(level: f64) -> f64 {
    level.clamp(0.0, 1.0)
}

/// Direction for relative volume steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDirection {
    Up,
    Down,
}

/// A player command. Transient: validated, executed, discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { reference: String, media_type: String },
    Pause,
    Resume,
    Stop,
    SetVolume { level: f64 },
    StepVolume { direction: VolumeDirection },
    Seek { offset: f64 },
    Mute { on: bool },
}

impl Command {
    /// Convenience constructor for `Play` with the default media type.
    pub fn play(reference: impl Into<String>) -> Self {
        Self::Play {
            reference: reference.into(),
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::SetVolume { .. } => "volume",
            Self::StepVolume {
                direction: VolumeDirection::Up,
            } => "volume_up",
            Self::StepVolume {
                direction: VolumeDirection::Down,
            } => "volume_down",
            Self::Seek { .. } => "seek",
            Self::Mute { .. } => "mute",
        }
    }

    /// Checks the payload before anything reaches the backend.
    ///
    /// Out-of-range volume is not an error (it is clamped later); a
    /// non-finite one is, since it has no meaningful clamp.
    pub fn validate(&self) -> PlaybackResult<()> {
        match self {
            Self::Play { reference, .. } if reference.trim().is_empty() => Err(
                PlaybackError::InvalidCommand("media reference must not be empty".into()),
            ),
            Self::SetVolume { level } if !level.is_finite() => Err(
                PlaybackError::InvalidCommand("volume level must be a finite number".into()),
            ),
            Self::Seek { offset } if !offset.is_finite() || *offset < 0.0 => Err(
                PlaybackError::InvalidCommand("seek offset must be a non-negative number".into()),
            ),
            _ => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Format
// ─────────────────────────────────────────────────────────────────────────────

/// JSON body of `POST /api/command`.
///
/// Aliases keep older clients working (`play` for resume, `muted`, `position`).
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum CommandRequest {
    PlayMedia {
        #[serde(default)]
        media_type: Option<String>,
        media_id: String,
    },
    Pause,
    #[serde(alias = "play")]
    Resume,
    Stop,
    Volume {
        level: f64,
    },
    VolumeUp,
    VolumeDown,
    Seek {
        #[serde(alias = "position")]
        offset: f64,
    },
    Mute {
        #[serde(alias = "muted")]
        on: bool,
    },
}

impl From<CommandRequest> for Command {
    fn from(req: CommandRequest) -> Self {
        match req {
            CommandRequest::PlayMedia {
                media_type,
                media_id,
            } => Command::Play {
                reference: media_id.trim().to_string(),
                media_type: media_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
            },
            CommandRequest::Pause => Command::Pause,
            CommandRequest::Resume => Command::Resume,
            CommandRequest::Stop => Command::Stop,
            CommandRequest::Volume { level } => Command::SetVolume { level },
            CommandRequest::VolumeUp => Command::StepVolume {
                direction: VolumeDirection::Up,
            },
            CommandRequest::VolumeDown => Command::StepVolume {
                direction: VolumeDirection::Down,
            },
            CommandRequest::Seek { offset } => Command::Seek { offset },
            CommandRequest::Mute { on } => Command::Mute { on },
        }
    }
}

/// Parses and validates a JSON command body.
pub fn parse_command(body: &[u8]) -> PlaybackResult<Command> {
    let request: CommandRequest = serde_json::from_slice(body)
        .map_err(|e| PlaybackError::InvalidCommand(e.to_string()))?;
    let command = Command::from(request);
    command.validate()?;
    Ok(command)
}
