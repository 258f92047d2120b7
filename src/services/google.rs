// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Calendar v3 and Google Tasks v1 API client.
//!
//! Handles:
//! - Event create/update/delete/list within a time window
//! - Task-list find/create and task item create/update/list
//! - Token refresh-grant and revoke endpoints
//! - Status-code mapping into the sync error taxonomy

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::time_utils::{format_utc_rfc3339, SyncWindow};

/// Upper bound on any single remote call. Timeouts surface as
/// `RemoteTransient` and never abort a whole batch.
const REMOTE_TIMEOUT_SECS: u64 = 20;

/// Google API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    calendar_base: String,
    tasks_base: String,
    token_url: String,
    revoke_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleClient {
    /// Create a new Google client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http,
            calendar_base: "https://www.googleapis.com/calendar/v3".to_string(),
            tasks_base: "https://tasks.googleapis.com/tasks/v1".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            client_id,
            client_secret,
        })
    }

    /// Override the API base URLs (tests point these at a local server).
    /// `oauth_base` serves both `/token` and `/revoke`.
    #[cfg(any(test, debug_assertions))]
    pub fn with_base_urls(mut self, calendar: &str, tasks: &str, oauth_base: &str) -> Self {
        self.calendar_base = calendar.to_string();
        self.tasks_base = tasks.to_string();
        self.token_url = format!("{}/token", oauth_base);
        self.revoke_url = format!("{}/revoke", oauth_base);
        self
    }

    // ─── Calendar Events ─────────────────────────────────────────

    /// List timed and all-day events in a calendar inside the window.
    /// Recurring events are expanded server-side; pagination is followed to
    /// the end.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &SyncWindow,
    ) -> Result<Vec<GoogleEvent>, AppError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.calendar_base,
            urlencoding::encode(calendar_id)
        );

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin".to_string(), format_utc_rfc3339(window.start)),
                ("timeMax".to_string(), format_utc_rfc3339(window.end)),
                ("singleEvents".to_string(), "true".to_string()),
                ("orderBy".to_string(), "startTime".to_string()),
                ("maxResults".to_string(), "250".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken".to_string(), token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(map_transport_error)?;

            let page: EventsPage = self.check_response_json(response).await?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }

    /// Create an event and return its id.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &serde_json::Value,
    ) -> Result<GoogleEvent, AppError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.calendar_base,
            urlencoding::encode(calendar_id)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response_json(response).await
    }

    /// Update an existing event in place.
    pub async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        body: &serde_json::Value,
    ) -> Result<GoogleEvent, AppError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.calendar_base,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response_json(response).await
    }

    /// Delete an event. Already-deleted events (404/410) count as success.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.calendar_base,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );

        let response = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        match self.check_response(response).await {
            Err(AppError::RemoteNotFound(_)) => Ok(()),
            other => other,
        }
    }

    // ─── Task Lists ──────────────────────────────────────────────

    /// List all of the user's task lists.
    pub async fn list_tasklists(&self, access_token: &str) -> Result<Vec<GoogleTaskList>, AppError> {
        let url = format!("{}/users/@me/lists", self.tasks_base);

        let mut lists = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("maxResults".to_string(), "100".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken".to_string(), token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(map_transport_error)?;

            let page: TaskListsPage = self.check_response_json(response).await?;
            lists.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(lists)
    }

    /// Create a task list with the given title.
    pub async fn create_tasklist(
        &self,
        access_token: &str,
        title: &str,
    ) -> Result<GoogleTaskList, AppError> {
        let url = format!("{}/users/@me/lists", self.tasks_base);
        let body = serde_json::json!({ "title": title });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response_json(response).await
    }

    // ─── Task Items ──────────────────────────────────────────────

    /// List all tasks in a list, including completed and hidden items.
    pub async fn list_tasks(
        &self,
        access_token: &str,
        list_id: &str,
    ) -> Result<Vec<GoogleTask>, AppError> {
        let url = format!(
            "{}/lists/{}/tasks",
            self.tasks_base,
            urlencoding::encode(list_id)
        );

        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("showCompleted".to_string(), "true".to_string()),
                ("showHidden".to_string(), "true".to_string()),
                ("maxResults".to_string(), "100".to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken".to_string(), token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(map_transport_error)?;

            let page: TasksPage = self.check_response_json(response).await?;
            tasks.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(tasks)
    }

    /// Create a task in a list.
    pub async fn insert_task(
        &self,
        access_token: &str,
        list_id: &str,
        body: &serde_json::Value,
    ) -> Result<GoogleTask, AppError> {
        let url = format!(
            "{}/lists/{}/tasks",
            self.tasks_base,
            urlencoding::encode(list_id)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response_json(response).await
    }

    /// Patch an existing task.
    pub async fn patch_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
        body: &serde_json::Value,
    ) -> Result<GoogleTask, AppError> {
        let url = format!(
            "{}/lists/{}/tasks/{}",
            self.tasks_base,
            urlencoding::encode(list_id),
            urlencoding::encode(task_id)
        );

        let response = self
            .http
            .patch(&url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response_json(response).await
    }

    /// Delete a task. Already-deleted tasks count as success.
    pub async fn delete_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/lists/{}/tasks/{}",
            self.tasks_base,
            urlencoding::encode(list_id),
            urlencoding::encode(task_id)
        );

        let response = self
            .http
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        match self.check_response(response).await {
            Err(AppError::RemoteNotFound(_)) => Ok(()),
            other => other,
        }
    }

    // ─── OAuth Endpoints ─────────────────────────────────────────

    /// Exchange an authorization code for tokens (first grant).
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange failed");
            return Err(AppError::RefreshFailed(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expired access token via the refresh grant.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google token refresh failed");
            return Err(AppError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Failed to parse refresh response: {}", e)))
    }

    /// Revoke a token pair at Google. Invalidates both the access and the
    /// refresh token; used on disconnect.
    pub async fn revoke_token(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(map_transport_error)?;

        self.check_response(response).await?;
        tracing::info!("Google token revocation successful");
        Ok(())
    }

    // ─── Response Handling ───────────────────────────────────────

    /// Check response status and return an error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RemoteApi(format!("JSON parse error: {}", e)))
    }
}

/// Map an HTTP failure status to the sync error taxonomy.
fn classify_status(status: reqwest::StatusCode, body: String) -> AppError {
    match status.as_u16() {
        // Expired or revoked grant: the caller must surface "reconnect"
        401 => AppError::RemoteUnauthorized,
        // Permission problem on one calendar/list; reported per-item
        403 => AppError::RemoteForbidden(body),
        404 | 410 => AppError::RemoteNotFound(body),
        // Rate limited or server-side; eligible for caller-driven retry
        429 => {
            tracing::warn!("Google rate limit hit (429)");
            AppError::RemoteTransient(format!("HTTP 429: {}", body))
        }
        code if code >= 500 => AppError::RemoteTransient(format!("HTTP {}: {}", code, body)),
        code => AppError::RemoteApi(format!("HTTP {}: {}", code, body)),
    }
}

/// Map reqwest transport errors; timeouts are transient by policy.
fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::RemoteTransient(format!("Request timed out: {}", e))
    } else {
        AppError::RemoteApi(e.to_string())
    }
}

// ─── Wire Types ──────────────────────────────────────────────────

/// Event start/end. Timed events carry `dateTime`; all-day events carry
/// only `date`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

/// Calendar event response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color_id: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
}

impl GoogleEvent {
    /// Timed start instant; None for all-day events.
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.start.as_ref().and_then(|t| t.date_time)
    }

    pub fn is_all_day(&self) -> bool {
        self.start_instant().is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

/// Task list metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTaskList {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskListsPage {
    #[serde(default)]
    items: Vec<GoogleTaskList>,
    next_page_token: Option<String>,
}

/// Task item response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTask {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// "needsAction" or "completed"
    #[serde(default)]
    pub status: Option<String>,
}

impl GoogleTask {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TasksPage {
    #[serde(default)]
    items: Vec<GoogleTask>,
    next_page_token: Option<String>,
}

/// Token exchange response from the authorization-code grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token refresh response. Google usually omits `refresh_token` here;
/// when present the stored one must be rotated.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
