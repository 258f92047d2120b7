// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync engine: push internal tasks to Google, pull events and task states
//! back, connect and disconnect credentials.
//!
//! The push path's correctness hinges on one rule: links are re-read from
//! Firestore at the start of every batch and override whatever external id
//! the caller supplied. The caller's view may be stale relative to a sync
//! that finished on another client; trusting it would create duplicate
//! remote objects. The mirror-image rule is that this engine never writes
//! links back - the caller applies them through its own versioned save
//! path, so the engine cannot race a concurrent client-driven save.

use chrono::Local;
use futures_util::{stream, StreamExt};
use serde::Serialize;

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Category, InternalTask, KeyVersion, SyncCredential};
use crate::services::codec;
use crate::services::crypto::TokenCipher;
use crate::services::google::{GoogleClient, GoogleEvent, GoogleTask, TokenExchangeResponse};
use crate::services::token::TokenService;
use crate::time_utils::{format_utc_rfc3339, logical_day_window};

/// Well-known title of the dedicated remote task list.
const DEDICATED_LIST_TITLE: &str = "Planbridge";

/// Cap on concurrent remote calls within one batch.
const MAX_CONCURRENT_REMOTE_OPS: usize = 8;

/// Where a push batch lands remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Calendar(String),
    TaskList(String),
}

impl SyncTarget {
    pub fn container_id(&self) -> &str {
        match self {
            SyncTarget::Calendar(id) | SyncTarget::TaskList(id) => id,
        }
    }
}

/// What happened to one pushed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushItemResult {
    pub internal_task_id: String,
    pub external_object_id: String,
    pub action: PushAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushItemError {
    pub internal_task_id: String,
    pub reason: String,
    /// Whether a later sync run may succeed without user action
    pub transient: bool,
}

/// Outcome of a push batch. Per-item failures live in `errors`; only a
/// batch where every item failed surfaces as a call-level error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub results: Vec<PushItemResult>,
    pub errors: Vec<PushItemError>,
    /// True when sync is paused for this user and nothing was attempted
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// One calendar event, classified against our identity signals.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedEvent {
    pub external_id: String,
    pub calendar_id: String,
    /// Title with any recognized glyph stripped
    pub title: String,
    pub category: Option<Category>,
    /// Whether color or glyph marks this event as planbridge-authored
    pub internally_authored: bool,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CalendarPullReport {
    pub events: Vec<ClassifiedEvent>,
    pub window: Option<WindowInfo>,
    /// Calendars that failed and were skipped
    pub failed_calendars: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// A remote task carrying our notes tag: completion flows back inward.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedTaskStatus {
    pub internal_task_id: String,
    pub external_object_id: String,
    pub completed: bool,
}

/// A remote task authored outside planbridge, available for adoption.
#[derive(Debug, Clone, Serialize)]
pub struct UnlinkedRemoteTask {
    pub external_object_id: String,
    pub title: String,
    pub category: Option<Category>,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskSyncStatus {
    pub list_id: String,
    pub linked: Vec<LinkedTaskStatus>,
    pub unlinked: Vec<UnlinkedRemoteTask>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// High-level sync service: token lifecycle behind every operation, Google
/// API in front.
#[derive(Clone)]
pub struct SyncService {
    google: GoogleClient,
    tokens: TokenService,
    db: FirestoreDb,
    cipher: TokenCipher,
    oauth_redirect_url: String,
}

impl SyncService {
    pub fn new(
        config: &Config,
        google: GoogleClient,
        tokens: TokenService,
        db: FirestoreDb,
        cipher: TokenCipher,
    ) -> Self {
        Self {
            google,
            tokens,
            db,
            cipher,
            oauth_redirect_url: config.oauth_redirect_url.clone(),
        }
    }

    // ─── Push ────────────────────────────────────────────────────

    /// Push a batch of internal tasks to one remote container.
    ///
    /// Create-vs-update is decided per task from the freshly re-read link
    /// store. Items fail independently; the returned report carries the
    /// external id per task for the caller to persist.
    pub async fn push_tasks(
        &self,
        user_id: &str,
        mut tasks: Vec<InternalTask>,
        target: SyncTarget,
    ) -> Result<PushReport, AppError> {
        if tasks.is_empty() {
            return Ok(PushReport::default());
        }

        let grant = match self.tokens.get_valid_access_token(user_id).await {
            Ok(grant) => grant,
            Err(AppError::SyncDisabled(_)) => {
                tracing::debug!(user_id, "Sync disabled, push is a no-op");
                return Ok(PushReport {
                    disabled: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        // Stale-state guard: the durable links win over caller-supplied ids.
        let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let links = self
            .db
            .get_links_for_tasks(&task_ids, target.container_id())
            .await?;
        merge_links(&mut tasks, &links);

        let outcomes: Vec<std::result::Result<PushItemResult, PushItemError>> =
            stream::iter(tasks)
                .map(|task| {
                    let token = grant.token.clone();
                    let target = target.clone();
                    async move {
                        let task_id = task.id.clone();
                        self.push_item(&token, &target, task).await.map_err(|e| {
                            PushItemError {
                                internal_task_id: task_id,
                                transient: e.is_transient(),
                                reason: e.to_string(),
                            }
                        })
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_REMOTE_OPS)
                .collect()
                .await;

        let mut report = PushReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(error) => {
                    tracing::warn!(
                        user_id,
                        internal_task_id = %error.internal_task_id,
                        reason = %error.reason,
                        "Push item failed"
                    );
                    report.errors.push(error);
                }
            }
        }

        if report.results.is_empty() && !report.errors.is_empty() {
            return Err(AppError::BatchFailed(report.errors.len()));
        }

        tracing::info!(
            user_id,
            pushed = report.results.len(),
            failed = report.errors.len(),
            "Push batch complete"
        );
        Ok(report)
    }

    /// Push one task: update when a link exists, create otherwise. An update
    /// whose remote object is gone falls back to create so the task is not
    /// stranded behind a dangling link.
    async fn push_item(
        &self,
        access_token: &str,
        target: &SyncTarget,
        task: InternalTask,
    ) -> Result<PushItemResult, AppError> {
        match target {
            SyncTarget::Calendar(calendar_id) => {
                let body = build_event_body(&task)?;
                match &task.external_object_id {
                    Some(event_id) => {
                        match self
                            .google
                            .update_event(access_token, calendar_id, event_id, &body)
                            .await
                        {
                            Ok(event) => Ok(PushItemResult {
                                internal_task_id: task.id,
                                external_object_id: event.id,
                                action: PushAction::Updated,
                            }),
                            Err(AppError::RemoteNotFound(_)) => {
                                let event = self
                                    .google
                                    .insert_event(access_token, calendar_id, &body)
                                    .await?;
                                Ok(PushItemResult {
                                    internal_task_id: task.id,
                                    external_object_id: event.id,
                                    action: PushAction::Created,
                                })
                            }
                            Err(e) => Err(e),
                        }
                    }
                    None => {
                        let event = self
                            .google
                            .insert_event(access_token, calendar_id, &body)
                            .await?;
                        Ok(PushItemResult {
                            internal_task_id: task.id,
                            external_object_id: event.id,
                            action: PushAction::Created,
                        })
                    }
                }
            }
            SyncTarget::TaskList(list_id) => {
                let body = build_task_body(&task);
                match &task.external_object_id {
                    Some(remote_id) => {
                        match self
                            .google
                            .patch_task(access_token, list_id, remote_id, &body)
                            .await
                        {
                            Ok(remote) => Ok(PushItemResult {
                                internal_task_id: task.id,
                                external_object_id: remote.id,
                                action: PushAction::Updated,
                            }),
                            Err(AppError::RemoteNotFound(_)) => {
                                let remote =
                                    self.google.insert_task(access_token, list_id, &body).await?;
                                Ok(PushItemResult {
                                    internal_task_id: task.id,
                                    external_object_id: remote.id,
                                    action: PushAction::Created,
                                })
                            }
                            Err(e) => Err(e),
                        }
                    }
                    None => {
                        let remote = self.google.insert_task(access_token, list_id, &body).await?;
                        Ok(PushItemResult {
                            internal_task_id: task.id,
                            external_object_id: remote.id,
                            action: PushAction::Created,
                        })
                    }
                }
            }
        }
    }

    /// Remove one task's remote counterpart. Deleting an already-deleted
    /// object is success.
    pub async fn delete_remote(
        &self,
        user_id: &str,
        target: &SyncTarget,
        external_object_id: &str,
    ) -> Result<(), AppError> {
        let grant = self.tokens.get_valid_access_token(user_id).await?;
        match target {
            SyncTarget::Calendar(calendar_id) => {
                self.google
                    .delete_event(&grant.token, calendar_id, external_object_id)
                    .await
            }
            SyncTarget::TaskList(list_id) => {
                self.google
                    .delete_task(&grant.token, list_id, external_object_id)
                    .await
            }
        }
    }

    // ─── Pull: Calendar ──────────────────────────────────────────

    /// Fetch and classify events across the user's selected calendars for
    /// one logical day.
    pub async fn fetch_calendar_window(
        &self,
        user_id: &str,
        calendar_ids: &[String],
        day_offset: i64,
    ) -> Result<CalendarPullReport, AppError> {
        let grant = match self.tokens.get_valid_access_token(user_id).await {
            Ok(grant) => grant,
            Err(AppError::SyncDisabled(_)) => {
                return Ok(CalendarPullReport {
                    disabled: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        let window = logical_day_window(Local::now(), day_offset)?;

        let fetches: Vec<(String, Result<Vec<GoogleEvent>, AppError>)> =
            stream::iter(calendar_ids.to_vec())
                .map(|calendar_id| {
                    let token = grant.token.clone();
                    let window = window;
                    async move {
                        let result = self.google.list_events(&token, &calendar_id, &window).await;
                        (calendar_id, result)
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_REMOTE_OPS)
                .collect()
                .await;

        let mut tagged = Vec::new();
        let mut failed_calendars = Vec::new();
        let mut last_error = None;

        for (calendar_id, result) in fetches {
            match result {
                Ok(events) => {
                    tagged.extend(events.into_iter().map(|e| (calendar_id.clone(), e)));
                }
                Err(e) => {
                    tracing::warn!(user_id, calendar_id = %calendar_id, error = %e, "Calendar fetch failed, skipping");
                    failed_calendars.push(calendar_id);
                    last_error = Some(e);
                }
            }
        }

        // Total failure only when every calendar failed
        if !calendar_ids.is_empty() && failed_calendars.len() == calendar_ids.len() {
            return Err(last_error.unwrap_or(AppError::BatchFailed(calendar_ids.len())));
        }

        let events = classify_events(tagged);

        Ok(CalendarPullReport {
            events,
            window: Some(WindowInfo {
                start: format_utc_rfc3339(window.start),
                end: format_utc_rfc3339(window.end),
            }),
            failed_calendars,
            disabled: false,
        })
    }

    // ─── Pull: Tasks ─────────────────────────────────────────────

    /// Fetch completion state from the dedicated remote list, partitioned
    /// into internally-linked and externally-authored items.
    pub async fn fetch_task_sync_status(&self, user_id: &str) -> Result<TaskSyncStatus, AppError> {
        let grant = match self.tokens.get_valid_access_token(user_id).await {
            Ok(grant) => grant,
            Err(AppError::SyncDisabled(_)) => {
                return Ok(TaskSyncStatus {
                    disabled: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        let list_id = self.ensure_dedicated_list(&grant.token).await?;
        let items = self.google.list_tasks(&grant.token, &list_id).await?;

        let (linked, unlinked) = partition_remote_tasks(items);

        tracing::debug!(
            user_id,
            list_id = %list_id,
            linked = linked.len(),
            unlinked = unlinked.len(),
            "Task sync status fetched"
        );

        Ok(TaskSyncStatus {
            list_id,
            linked,
            unlinked,
            disabled: false,
        })
    }

    /// Find the dedicated list by its well-known title, creating it on first
    /// use. Find-before-create keeps repeated calls from multiplying lists.
    async fn ensure_dedicated_list(&self, access_token: &str) -> Result<String, AppError> {
        let lists = self.google.list_tasklists(access_token).await?;
        if let Some(list) = lists.iter().find(|l| l.title == DEDICATED_LIST_TITLE) {
            return Ok(list.id.clone());
        }

        tracing::info!(title = DEDICATED_LIST_TITLE, "Creating dedicated task list");
        let created = self
            .google
            .create_tasklist(access_token, DEDICATED_LIST_TITLE)
            .await?;
        Ok(created.id)
    }

    // ─── Connect / Disconnect ────────────────────────────────────

    /// Handle the OAuth callback: exchange the code, seal both tokens under
    /// the current scheme, store the credential enabled.
    pub async fn handle_oauth_callback(&self, user_id: &str, code: &str) -> Result<(), AppError> {
        let exchanged: TokenExchangeResponse = self
            .google
            .exchange_code(code, &self.oauth_redirect_url)
            .await?;

        let refresh_token = exchanged.refresh_token.as_deref().ok_or_else(|| {
            AppError::RefreshFailed(
                "Google returned no refresh token; re-consent required".to_string(),
            )
        })?;

        let now = chrono::Utc::now();
        let expires_at = now + chrono::Duration::seconds(exchanged.expires_in);

        let credential = SyncCredential {
            user_id: user_id.to_string(),
            access_token_encrypted: Some(self.cipher.encrypt(&exchanged.access_token, user_id)?),
            refresh_token_encrypted: Some(self.cipher.encrypt(refresh_token, user_id)?),
            key_version: KeyVersion::V2,
            access_token_expires_at: Some(format_utc_rfc3339(expires_at)),
            enabled: true,
            granted_scopes: exchanged
                .scope
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            connected_at: format_utc_rfc3339(now),
        };

        self.db.set_credential(&credential).await?;
        self.tokens.invalidate(user_id);

        tracing::info!(user_id, "Google credential stored");
        Ok(())
    }

    /// Disconnect: best-effort remote revoke, then clear the credential in
    /// place. Idempotent - disconnecting a never-connected user succeeds.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), AppError> {
        let credential = self.db.get_credential(user_id).await?;

        if let Some(credential) = &credential {
            if let Some(blob) = credential.access_token_encrypted.as_deref() {
                match self.cipher.decrypt(blob, user_id, KeyVersion::V2) {
                    Ok(access_token) => {
                        if let Err(e) = self.google.revoke_token(&access_token).await {
                            tracing::warn!(user_id, error = %e, "Remote revoke failed, clearing locally anyway");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Could not decrypt token for revoke, clearing locally anyway");
                    }
                }
            }
        }

        self.db.clear_credential(user_id).await?;
        self.tokens.invalidate(user_id);

        tracing::info!(user_id, "Google connection cleared");
        Ok(())
    }

    /// Connection status for the frontend.
    pub async fn connection_status(&self, user_id: &str) -> Result<ConnectionStatus, AppError> {
        let credential = self.db.get_credential(user_id).await?;
        Ok(match credential {
            Some(c) if c.is_usable() => ConnectionStatus {
                connected: true,
                enabled: true,
                granted_scopes: c.granted_scopes,
            },
            Some(c) if c.access_token_encrypted.is_some() => ConnectionStatus {
                connected: true,
                enabled: false,
                granted_scopes: c.granted_scopes,
            },
            _ => ConnectionStatus::default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub enabled: bool,
    pub granted_scopes: Vec<String>,
}

// ─── Pure Helpers ────────────────────────────────────────────────

/// Override caller-supplied external ids with the durable link store's
/// view. Tasks without a stored link keep whatever the caller sent only if
/// nothing fresher exists - and the store is always fresher.
fn merge_links(tasks: &mut [InternalTask], links: &[crate::models::ExternalLink]) {
    for task in tasks.iter_mut() {
        if let Some(link) = links.iter().find(|l| l.internal_task_id == task.id) {
            task.external_object_id = Some(link.external_object_id.clone());
        }
    }
}

/// Build the calendar event body for a task. Calendar pushes need scheduled
/// times; tasks without them are per-item errors, not batch failures.
fn build_event_body(task: &InternalTask) -> Result<serde_json::Value, AppError> {
    let (starts_at, ends_at) = match (task.starts_at, task.ends_at) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            return Err(AppError::BadRequest(
                "Task has no scheduled times for calendar push".to_string(),
            ))
        }
    };

    let summary = match task.category {
        Some(category) => format!("{}{}", codec::category_to_glyph(category), task.title),
        None => task.title.clone(),
    };

    let mut body = serde_json::json!({
        "summary": summary,
        "start": { "dateTime": format_utc_rfc3339(starts_at) },
        "end": { "dateTime": format_utc_rfc3339(ends_at) },
    });

    if let Some(category) = task.category {
        body["colorId"] = serde_json::Value::String(codec::category_to_color(category).to_string());
    }
    if let Some(notes) = &task.notes {
        body["description"] = serde_json::Value::String(notes.clone());
    }

    Ok(body)
}

/// Build the remote task body. The notes tag is the identity that survives
/// round trips through Google's UI.
fn build_task_body(task: &InternalTask) -> serde_json::Value {
    let title = match task.category {
        Some(category) => format!("{}{}", codec::category_to_glyph(category), task.title),
        None => task.title.clone(),
    };

    let mut body = serde_json::json!({
        "title": title,
        "notes": codec::embed_internal_id(&task.id, task.notes.as_deref()),
        "status": if task.completed { "completed" } else { "needsAction" },
    });

    if let Some(due) = task.due_date {
        let due_instant = due.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        if let Some(due_instant) = due_instant {
            body["due"] = serde_json::Value::String(format_utc_rfc3339(due_instant));
        }
    }

    body
}

/// Classify, de-duplicate, and order raw events from multiple calendars.
///
/// All-day events (no time-of-day) are discarded; the same event id seen
/// under two subscribed calendars keeps its first occurrence; the merged
/// result is sorted by start ascending.
fn classify_events(tagged: Vec<(String, GoogleEvent)>) -> Vec<ClassifiedEvent> {
    let mut seen = std::collections::HashSet::new();
    let mut classified: Vec<ClassifiedEvent> = Vec::new();

    for (calendar_id, event) in tagged {
        if event.status.as_deref() == Some("cancelled") {
            continue;
        }
        let Some(starts_at) = event.start_instant() else {
            continue; // all-day
        };
        if !seen.insert(event.id.clone()) {
            continue;
        }

        let raw_title = event.summary.clone().unwrap_or_default();
        let category = codec::classify(event.color_id.as_deref(), &raw_title);
        let internally_authored = category.is_some();

        classified.push(ClassifiedEvent {
            external_id: event.id,
            calendar_id,
            title: codec::strip_glyph(&raw_title).to_string(),
            category,
            internally_authored,
            starts_at,
            ends_at: event.end.as_ref().and_then(|t| t.date_time),
        });
    }

    classified.sort_by_key(|e| e.starts_at);
    classified
}

/// Split raw remote tasks into linked (ours, completion flows back) and
/// unlinked (externally authored, candidates for adoption).
fn partition_remote_tasks(
    items: Vec<GoogleTask>,
) -> (Vec<LinkedTaskStatus>, Vec<UnlinkedRemoteTask>) {
    let mut linked = Vec::new();
    let mut unlinked = Vec::new();

    for item in items {
        let completed = item.is_completed();
        let internal_id = item
            .notes
            .as_deref()
            .and_then(codec::extract_internal_id)
            .map(str::to_string);

        match internal_id {
            Some(internal_task_id) => linked.push(LinkedTaskStatus {
                internal_task_id,
                external_object_id: item.id,
                completed,
            }),
            None => {
                let raw_title = item.title.clone().unwrap_or_default();
                unlinked.push(UnlinkedRemoteTask {
                    external_object_id: item.id,
                    category: codec::glyph_to_category(&raw_title),
                    title: codec::strip_glyph(&raw_title).to_string(),
                    completed,
                });
            }
        }
    }

    (linked, unlinked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExternalLink;
    use crate::services::google::EventTime;
    use chrono::{TimeZone, Utc};

    fn task(id: &str, external: Option<&str>) -> InternalTask {
        InternalTask {
            id: id.to_string(),
            title: format!("Task {}", id),
            notes: None,
            category: Some(Category::Focus),
            starts_at: Some(Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap()),
            ends_at: Some(Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap()),
            due_date: None,
            completed: false,
            external_object_id: external.map(str::to_string),
        }
    }

    fn link(task_id: &str, external_id: &str) -> ExternalLink {
        ExternalLink {
            internal_task_id: task_id.to_string(),
            external_object_id: external_id.to_string(),
            external_container_id: "cal-1".to_string(),
            category: None,
        }
    }

    fn event(id: &str, start_hour: u32) -> GoogleEvent {
        GoogleEvent {
            id: id.to_string(),
            status: Some("confirmed".to_string()),
            summary: Some("🎯 Deep work".to_string()),
            description: None,
            color_id: None,
            start: Some(EventTime {
                date_time: Some(Utc.with_ymd_and_hms(2026, 8, 6, start_hour, 0, 0).unwrap()),
                date: None,
            }),
            end: None,
        }
    }

    #[test]
    fn test_merge_links_overrides_stale_caller_state() {
        // Caller thinks t1 is unlinked and t2 points at old-evt; the store
        // knows better in both cases.
        let mut tasks = vec![task("t1", None), task("t2", Some("old-evt"))];
        let links = vec![link("t1", "evt-a"), link("t2", "evt-b")];

        merge_links(&mut tasks, &links);

        assert_eq!(tasks[0].external_object_id.as_deref(), Some("evt-a"));
        assert_eq!(tasks[1].external_object_id.as_deref(), Some("evt-b"));
    }

    #[test]
    fn test_merge_links_leaves_unlinked_tasks_alone() {
        let mut tasks = vec![task("t1", None)];
        merge_links(&mut tasks, &[]);
        assert_eq!(tasks[0].external_object_id, None);
    }

    #[test]
    fn test_event_body_requires_scheduled_times() {
        let mut t = task("t1", None);
        t.starts_at = None;
        assert!(build_event_body(&t).is_err());
    }

    #[test]
    fn test_event_body_carries_identity_signals() {
        let body = build_event_body(&task("t1", None)).unwrap();
        assert_eq!(body["colorId"], "9");
        assert!(body["summary"].as_str().unwrap().starts_with("🎯 "));
        assert_eq!(body["start"]["dateTime"], "2026-08-06T09:00:00Z");
    }

    #[test]
    fn test_task_body_embeds_notes_tag() {
        let mut t = task("t42", None);
        t.notes = Some("bring slides".to_string());
        t.completed = true;

        let body = build_task_body(&t);
        assert_eq!(body["status"], "completed");
        assert!(body["notes"]
            .as_str()
            .unwrap()
            .contains("[pb-task:t42]"));
    }

    #[test]
    fn test_classify_dedups_across_calendars() {
        // Same event id subscribed under two calendars
        let tagged = vec![
            ("cal-a".to_string(), event("evt-1", 9)),
            ("cal-b".to_string(), event("evt-1", 9)),
            ("cal-b".to_string(), event("evt-2", 8)),
        ];

        let events = classify_events(tagged);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].external_id, "evt-2");
        assert_eq!(events[1].external_id, "evt-1");
    }

    #[test]
    fn test_classify_discards_all_day_events() {
        let mut all_day = event("evt-1", 9);
        all_day.start = Some(EventTime {
            date_time: None,
            date: Some(chrono::NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()),
        });

        let events = classify_events(vec![("cal-a".to_string(), all_day)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_classify_sorts_by_start_ascending() {
        let tagged = vec![
            ("cal-a".to_string(), event("late", 15)),
            ("cal-a".to_string(), event("early", 7)),
            ("cal-a".to_string(), event("mid", 11)),
        ];

        let ids: Vec<String> = classify_events(tagged)
            .into_iter()
            .map(|e| e.external_id)
            .collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_classify_marks_internal_authorship() {
        let mut foreign = event("evt-2", 10);
        foreign.summary = Some("Dentist".to_string());

        let events = classify_events(vec![
            ("cal-a".to_string(), event("evt-1", 9)),
            ("cal-a".to_string(), foreign),
        ]);

        assert!(events[0].internally_authored);
        assert_eq!(events[0].title, "Deep work");
        assert!(!events[1].internally_authored);
        assert_eq!(events[1].category, None);
    }

    #[test]
    fn test_partition_splits_by_notes_tag() {
        let ours = GoogleTask {
            id: "g1".to_string(),
            title: Some("🎯 Write report".to_string()),
            notes: Some("[pb-task:t9]".to_string()),
            status: Some("completed".to_string()),
        };
        let theirs = GoogleTask {
            id: "g2".to_string(),
            title: Some("☕ Buy beans".to_string()),
            notes: Some("from the good roaster".to_string()),
            status: Some("needsAction".to_string()),
        };

        let (linked, unlinked) = partition_remote_tasks(vec![ours, theirs]);

        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].internal_task_id, "t9");
        assert!(linked[0].completed);

        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].title, "Buy beans");
        assert_eq!(unlinked[0].category, Some(Category::Break));
        assert!(!unlinked[0].completed);
    }
}
