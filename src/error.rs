// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Account is not connected to Spotify")]
    NotConnected,

    #[error("Spotify session expired")]
    SessionExpired,

    #[error("Incorrect credentials")]
    IncorrectCredentials,

    #[error("Account is not verified")]
    NotVerified,

    #[error("Incorrect verification code")]
    InvalidCode,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Rate limited by Spotify")]
    RateLimited { retry_after: Option<u64> },

    #[error("Spotify API error")]
    UpstreamUnavailable { status: Option<u16>, body: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotConnected => (StatusCode::UNAUTHORIZED, "not_connected", None),
            AppError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired", None),
            AppError::IncorrectCredentials => {
                (StatusCode::UNAUTHORIZED, "incorrect_credentials", None)
            }
            AppError::NotVerified => (StatusCode::UNAUTHORIZED, "not_verified", None),
            AppError::InvalidCode => (StatusCode::BAD_REQUEST, "invalid_code", None),
            AppError::InvalidOrExpiredToken => {
                (StatusCode::BAD_REQUEST, "invalid_or_expired_token", None)
            }
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                retry_after.map(|s| format!("retry after {}s", s)),
            ),
            AppError::UpstreamUnavailable { status, body } => {
                tracing::warn!(status = ?status, body = %body, "Spotify API error");
                (StatusCode::BAD_GATEWAY, "spotify_error", Some(body.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Mail(msg) => {
                tracing::error!(error = %msg, "Mail error");
                (StatusCode::INTERNAL_SERVER_ERROR, "mail_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
