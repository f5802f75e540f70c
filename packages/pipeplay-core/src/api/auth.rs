//! Bearer-token gate for protected endpoints.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::error::AuthError;

/// Rejects requests without a matching `Authorization: Bearer` token.
///
/// A pass-through when auth is disabled. Rejected requests never reach the
/// handler, so they cannot change player state.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = &state.config.api.auth;
    if !auth.enabled {
        return Ok(next.run(request).await);
    }

    let Some(expected) = auth.api_key.as_deref() else {
        log::warn!("[Server] Auth enabled but no API key configured, rejecting request");
        return Err(AuthError::Unauthorized("no API key configured"));
    };

    let matched = bearer_token(request.headers())
        .map(|token| token_matches(token, expected));

    match matched {
        None => Err(AuthError::Unauthorized("missing bearer token")),
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            log::debug!("[Server] Rejected request to {} with wrong token", request.uri());
            Err(AuthError::Unauthorized("invalid bearer token"))
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>` (scheme is
/// case-insensitive).
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Constant-time token comparison.
fn token_matches(token: &str, expected: &str) -> bool {
    token.as_bytes().ct_eq(expected.as_bytes()).into()
}
