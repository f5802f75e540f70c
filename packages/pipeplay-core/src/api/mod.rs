//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to the player controller.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::context::{advertise_ip, IpDetector};
use crate::discovery::{DiscoveryBroadcaster, ServiceRecord};
use crate::player::PlayerController;

pub mod auth;
pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop terminated with an I/O error.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// Holds no request state of its own; every handler goes straight to the
/// controller.
#[derive(Clone)]
pub struct AppState {
    pub player: Arc<PlayerController>,
    /// Effective configuration, read-only after startup.
    pub config: Arc<Config>,
    /// Used to pick the advertised address when bound to a wildcard.
    pub ip_detector: Arc<dyn IpDetector>,
}

/// Binds the API socket, advertises it, and serves until `cancel` fires.
///
/// Discovery registration happens after the socket is listening and is
/// best-effort. The record is withdrawn once the server has drained.
///
/// # Errors
/// Returns [`ServerError::Bind`] if the address is unavailable.
pub async fn start_server(state: AppState, cancel: CancellationToken) -> Result<(), ServerError> {
    let addr = SocketAddr::new(state.config.api.host, state.config.api.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    let broadcaster = if state.config.discovery.enabled {
        advertise(&state, local_addr.port())
    } else {
        log::info!("[Server] Discovery disabled");
        None
    };

    log::info!("[Server] Listening on http://{}", local_addr);
    let app = http::create_router(state);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await;

    if let Some(broadcaster) = broadcaster {
        broadcaster.unregister();
    }
    log::info!("[Server] Stopped");
    result.map_err(ServerError::from)
}

fn advertise(state: &AppState, port: u16) -> Option<DiscoveryBroadcaster> {
    let ip = match advertise_ip(state.config.api.host, state.ip_detector.as_ref()) {
        Ok(ip) => ip,
        Err(e) => {
            log::warn!("[Server] Discovery unavailable: {}", e);
            return None;
        }
    };

    let record = ServiceRecord {
        name: state.config.discovery.name.clone(),
        ip,
        port,
        auth_required: state.config.auth_required(),
    };
    match DiscoveryBroadcaster::register(&record) {
        Ok(broadcaster) => Some(broadcaster),
        Err(e) => {
            log::warn!("[Server] Discovery registration failed: {}", e);
            None
        }
    }
}
