// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync API routes for authenticated users.
//!
//! These handlers are the internal caller of the sync engine: they hand
//! batches in, and hand the returned external ids back to the workspace
//! frontend, which persists links through its own versioned task-save path.

use axum::{
    extract::{Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::InternalTask;
use crate::services::sync::{
    CalendarPullReport, ConnectionStatus, PushReport, SyncTarget, TaskSyncStatus,
};
use crate::AppState;

/// Sync routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync/push", post(push_tasks))
        .route("/api/sync/calendar", get(fetch_calendar_window))
        .route("/api/sync/tasks", get(fetch_task_sync_status))
        .route("/api/sync/status", get(connection_status))
        .route("/api/sync/connection", delete(disconnect))
}

// ─── Push ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct PushRequest {
    /// Target container: exactly one of these must be set.
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub task_list_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub tasks: Vec<InternalTask>,
}

impl PushRequest {
    fn target(&self) -> Result<SyncTarget> {
        match (&self.calendar_id, &self.task_list_id) {
            (Some(calendar_id), None) => Ok(SyncTarget::Calendar(calendar_id.clone())),
            (None, Some(list_id)) => Ok(SyncTarget::TaskList(list_id.clone())),
            _ => Err(AppError::BadRequest(
                "Exactly one of calendar_id or task_list_id is required".to_string(),
            )),
        }
    }
}

/// Push a batch of tasks to one remote container.
///
/// Per-item failures come back in the `errors` array; the response is only
/// an HTTP error when the credential is unusable or every item failed.
async fn push_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushReport>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let target = request.target()?;

    let report = state
        .sync_service
        .push_tasks(&user.user_id, request.tasks, target)
        .await?;

    Ok(Json(report))
}

// ─── Pull: Calendar ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CalendarWindowParams {
    /// Comma-separated calendar ids
    pub calendars: String,
    /// Logical-day offset: -1 yesterday, 0 today, +1 tomorrow
    #[serde(default)]
    pub day_offset: i64,
}

/// Fetch classified events for one logical day across selected calendars.
async fn fetch_calendar_window(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CalendarWindowParams>,
) -> Result<Json<CalendarPullReport>> {
    let calendar_ids: Vec<String> = params
        .calendars
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if calendar_ids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one calendar id is required".to_string(),
        ));
    }
    if params.day_offset.abs() > 366 {
        return Err(AppError::BadRequest("day_offset out of range".to_string()));
    }

    let report = state
        .sync_service
        .fetch_calendar_window(&user.user_id, &calendar_ids, params.day_offset)
        .await?;

    Ok(Json(report))
}

// ─── Pull: Tasks ─────────────────────────────────────────────────

/// Fetch linked/unlinked task state from the dedicated remote list.
async fn fetch_task_sync_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TaskSyncStatus>> {
    let status = state
        .sync_service
        .fetch_task_sync_status(&user.user_id)
        .await?;
    Ok(Json(status))
}

// ─── Connection ──────────────────────────────────────────────────

/// Connection status for the integrations settings page.
async fn connection_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionStatus>> {
    let status = state.sync_service.connection_status(&user.user_id).await?;
    Ok(Json(status))
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

/// Disconnect Google: revoke remotely (best effort), clear the stored
/// credential in place.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DisconnectResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated disconnect");

    state.sync_service.disconnect(&user.user_id).await?;

    Ok(Json(DisconnectResponse { disconnected: true }))
}
