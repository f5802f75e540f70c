//! Centralized error types for the PipePlay core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses
//!
//! | Error | Code | HTTP |
//! |---|---|---|
//! | [`PlaybackError::InvalidCommand`] | `invalid_command` | 400 |
//! | [`AuthError::Unauthorized`] | `unauthorized` | 401 |
//! | [`PlaybackError::Unsupported`] | `unsupported` | 409 |
//! | [`PlaybackError::BackendFault`] | `backend_fault` | 500 |

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::player::BackendError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;

    /// Maps the error to an HTTP status code.
    fn status_code(&self) -> StatusCode;
}

/// Errors raised while executing a player command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// Malformed or unknown command payload. Never reaches the backend.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Operation not valid for the current media or state. No state change.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The native backend failed mid-command. The player is now in `error`.
    #[error("Backend fault: {0}")]
    BackendFault(String),
}

impl ErrorCode for PlaybackError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidCommand(_) => "invalid_command",
            Self::Unsupported(_) => "unsupported",
            Self::BackendFault(_) => "backend_fault",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported(_) => StatusCode::CONFLICT,
            Self::BackendFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BackendError> for PlaybackError {
    fn from(err: BackendError) -> Self {
        Self::BackendFault(err.to_string())
    }
}

/// Authentication failures on protected endpoints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// Bearer token missing or not matching the configured key.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Convenient Result alias for player commands.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

fn error_response<E: ErrorCode + std::fmt::Display>(err: &E) -> Response {
    let status = err.status_code();
    let body = ErrorResponse {
        error: err.code(),
        message: err.to_string(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for PlaybackError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = error_response(&self);
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            header::HeaderValue::from_static("Bearer"),
        );
        response
    }
}
