// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure talking to the provider's token or user-info endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthExchangeError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with an explicit error.
    #[error("provider rejected request: {0}")]
    Provider(String),

    /// The provider answered, but the body was unusable.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Token exchange failed: {0}")]
    AuthExchange(#[from] AuthExchangeError),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Credentials rejected after refresh")]
    AuthExpired,

    #[error("Remote API error: {0}")]
    Remote(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Token store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the user has to go through the authorization flow again.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            AppError::AuthenticationFailed(_) | AppError::RefreshFailed(_) | AppError::AuthExpired
        )
    }
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
            AppError::AuthenticationFailed(msg) => (
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                Some(msg.clone()),
            ),
            AppError::RefreshFailed(msg) => {
                tracing::warn!(error = %msg, "Token refresh failed");
                (StatusCode::UNAUTHORIZED, "refresh_failed", None)
            }
            AppError::AuthExpired => (StatusCode::UNAUTHORIZED, "auth_expired", None),
            AppError::AuthExchange(err) => {
                tracing::warn!(error = %err, "Token exchange failed");
                (StatusCode::BAD_GATEWAY, "auth_exchange_error", None)
            }
            AppError::Remote(msg) => (StatusCode::BAD_GATEWAY, "remote_error", Some(msg.clone())),
            AppError::Transport(msg) => {
                (StatusCode::BAD_GATEWAY, "transport_error", Some(msg.clone()))
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Token store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
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
