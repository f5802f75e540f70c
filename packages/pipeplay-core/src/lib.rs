//! PipePlay Core - a network-controllable audio player.
//!
//! A single logical player is driven by a native playback backend and exposed
//! over a small authenticated HTTP API, advertised on the local network via
//! DNS-SD.
//!
//! # Architecture
//!
//! - [`player`]: Command model, backend seam and the [`PlayerController`]
//! - [`metadata`]: Best-effort tag extraction with an LRU cache
//! - [`config`]: Typed JSON configuration and its on-disk store
//! - [`api`]: Axum router, bearer auth and server startup
//! - [`discovery`]: DNS-SD service record
//! - [`bootstrap`]: Composition root
//! - [`error`]: API-visible error types
//! - [`runtime`]: Runtime handle for background tasks
//!
//! # Abstraction Traits
//!
//! - [`PlaybackBackend`](player::PlaybackBackend): Native audio engine
//! - [`MetadataSource`](metadata::MetadataSource): Tag lookup
//! - [`IpDetector`](context::IpDetector): Local IP detection

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod player;
pub mod protocol_constants;
pub mod runtime;

// Re-export commonly used types at the crate root
pub use api::{start_server, AppState, ServerError};
pub use bootstrap::{bootstrap_services, bootstrap_with_backend, BootstrappedServices};
pub use config::{Config, ConfigError, ConfigStore};
pub use context::{IpDetector, LocalIpDetector, NetworkError};
pub use discovery::{DiscoveryBroadcaster, DiscoveryError, ServiceRecord};
pub use error::{AuthError, ErrorCode, PlaybackError, PlaybackResult};
pub use metadata::{MetadataResolver, MetadataSource};
pub use player::{
    BackendError, BackendUpdate, Command, MediaMetadata, NullBackend, PlaybackBackend,
    PlayerController, PlayerState, PlayerStatus, VolumeDirection,
};
pub use runtime::TokioSpawner;
