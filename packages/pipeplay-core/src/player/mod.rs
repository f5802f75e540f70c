//! Player control: command model, backend abstraction and the controller.

mod backend;
mod controller;
#[cfg(any(feature = "mpv", test))]
mod load_tracker;
#[cfg(feature = "mpv")]
mod mpv;
mod types;

pub use backend::{
    is_network_reference, BackendError, BackendResult, BackendUpdate, NullBackend,
    PlaybackBackend,
};
pub use controller::PlayerController;
#[cfg(feature = "mpv")]
pub use mpv::MpvBackend;
pub use types::{
    clamp_volume, parse_command, Command, MediaMetadata, PlayerState, PlayerStatus,
    VolumeDirection,
};
