//! Fixed identifiers and wire constants shared by the API and discovery record.
//!
//! Clients (the home-automation integration in particular) match on these
//! values, so changing them breaks discovery or capability negotiation.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Service Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by `/api/info` and the discovery TXT record.
pub const SERVICE_ID: &str = "pipeplay";

/// Human-readable application name.
pub const APP_NAME: &str = "PipePlay";

/// Version of the HTTP API contract (independent of the crate version).
pub const API_VERSION: &str = "1.0";

/// Crate version, reported to clients.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// DNS-SD service type advertised on the local network.
pub const SERVICE_TYPE: &str = "_pipeplay._tcp.local.";

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Command names accepted by `POST /api/command`.
pub const SUPPORTED_COMMANDS: &[&str] = &[
    "play_media",
    "play",
    "pause",
    "resume",
    "stop",
    "volume",
    "volume_up",
    "volume_down",
    "mute",
    "seek",
];

/// Media type hints accepted with `play_media`.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["music", "podcast", "url"];

/// Media type assumed when `play_media` omits one.
pub const DEFAULT_MEDIA_TYPE: &str = "music";

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between backend progress samples.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(500);
