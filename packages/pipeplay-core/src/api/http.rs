//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the player controller.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::api::auth::require_bearer;
use crate::api::AppState;
use crate::error::PlaybackResult;
use crate::player::{parse_command, PlayerStatus};
use crate::protocol_constants::{
    API_VERSION, APP_VERSION, SERVICE_ID, SUPPORTED_COMMANDS, SUPPORTED_MEDIA_TYPES,
};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
///
/// `/health` and `/api/auth/info` are always public; everything else sits
/// behind [`require_bearer`].
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/info", get(get_info))
        .route("/api/command", post(post_command))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/info", get(auth_info))
        .merge(protected)
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn auth_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "auth_required": state.config.auth_required() }))
}

async fn get_status(State(state): State<AppState>) -> Json<PlayerStatus> {
    Json(state.player.current_status())
}

async fn get_info(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    Json(json!({
        "service": SERVICE_ID,
        "name": config.name,
        "unique_id": config.unique_id,
        "device_class": config.device_class,
        "version": APP_VERSION,
        "api_version": API_VERSION,
        "capabilities": SUPPORTED_COMMANDS,
        "supported_media_types": SUPPORTED_MEDIA_TYPES,
    }))
}

/// Body is taken raw so that malformed JSON maps to `invalid_command` rather
/// than axum's own rejection.
async fn post_command(
    State(state): State<AppState>,
    body: Bytes,
) -> PlaybackResult<Json<PlayerStatus>> {
    let command = parse_command(&body)?;
    let status = state.player.execute(command).await?;
    Ok(Json(status))
}
