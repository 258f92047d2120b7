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

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ─── Credential / token lifecycle ────────────────────────────
    #[error("No usable Google credential for user {0}")]
    CredentialMissing(String),

    #[error("Sync is disabled for user {0}")]
    SyncDisabled(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Token refresh already in progress")]
    RefreshInProgress,

    // ─── Remote (Google) API ─────────────────────────────────────
    #[error("Google rejected the access token")]
    RemoteUnauthorized,

    #[error("Google denied access: {0}")]
    RemoteForbidden(String),

    #[error("Remote object not found: {0}")]
    RemoteNotFound(String),

    #[error("Transient Google API failure: {0}")]
    RemoteTransient(String),

    #[error("Google API error: {0}")]
    RemoteApi(String),

    #[error("All {0} items in the sync batch failed")]
    BatchFailed(usize),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the only fix is the user reconnecting their Google account.
    ///
    /// These are the states the frontend surfaces as "reconnect required";
    /// everything else degrades to "will retry on next sync".
    pub fn is_reconnect_required(&self) -> bool {
        matches!(
            self,
            AppError::CredentialMissing(_)
                | AppError::RemoteUnauthorized
                | AppError::RefreshFailed(_)
        )
    }

    /// True for failures a later sync run may succeed on without user action
    /// (timeouts, 429s, 5xx, a refresh held by another caller).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::RemoteTransient(_) | AppError::RefreshInProgress
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
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::CredentialMissing(_) => (StatusCode::CONFLICT, "not_connected", None),
            AppError::SyncDisabled(_) => (StatusCode::CONFLICT, "sync_disabled", None),
            AppError::RefreshFailed(msg) => {
                tracing::warn!(error = %msg, "Token refresh failed");
                (StatusCode::CONFLICT, "reconnect_required", None)
            }
            AppError::RefreshInProgress => {
                (StatusCode::SERVICE_UNAVAILABLE, "refresh_in_progress", None)
            }
            AppError::RemoteUnauthorized => (StatusCode::CONFLICT, "reconnect_required", None),
            AppError::RemoteForbidden(msg) => {
                (StatusCode::BAD_GATEWAY, "google_forbidden", Some(msg.clone()))
            }
            AppError::RemoteNotFound(msg) => {
                (StatusCode::BAD_GATEWAY, "google_not_found", Some(msg.clone()))
            }
            AppError::RemoteTransient(msg) => {
                (StatusCode::BAD_GATEWAY, "google_unavailable", Some(msg.clone()))
            }
            AppError::RemoteApi(msg) => {
                (StatusCode::BAD_GATEWAY, "google_error", Some(msg.clone()))
            }
            AppError::BatchFailed(count) => (
                StatusCode::BAD_GATEWAY,
                "batch_failed",
                Some(format!("{} items failed", count)),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
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
