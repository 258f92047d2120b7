// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process stand-in for the Google Calendar/Tasks/OAuth endpoints.
//!
//! Serves just enough of the wire surface for the sync engine: canned event
//! pages per calendar, a mutable task-list store, and a counting refresh
//! endpoint. Tests assert on the counters to pin call-level behavior
//! (single-flight refresh, find-before-create).

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MockState {
    /// Canned events per calendar id
    pub events: HashMap<String, Vec<Value>>,
    /// Calendar ids that answer 503
    pub failing_calendars: Vec<String>,
    /// Task lists: (id, title)
    pub tasklists: Vec<(String, String)>,
    /// Tasks per list id
    pub tasks: HashMap<String, Vec<Value>>,
    /// Event ids that answer 404 on update
    pub missing_events: Vec<String>,
}

pub struct MockGoogle {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub revoke_calls: Arc<AtomicUsize>,
    pub list_creates: Arc<AtomicUsize>,
    pub event_inserts: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<MockState>>,
    refresh_calls: Arc<AtomicUsize>,
    revoke_calls: Arc<AtomicUsize>,
    list_creates: Arc<AtomicUsize>,
    event_inserts: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
}

impl MockGoogle {
    /// Spawn the mock on an ephemeral port.
    pub async fn start(initial: MockState) -> Self {
        let state = Arc::new(Mutex::new(initial));
        let refresh_calls = Arc::new(AtomicUsize::new(0));
        let revoke_calls = Arc::new(AtomicUsize::new(0));
        let list_creates = Arc::new(AtomicUsize::new(0));
        let event_inserts = Arc::new(AtomicUsize::new(0));

        let shared = Shared {
            state: state.clone(),
            refresh_calls: refresh_calls.clone(),
            revoke_calls: revoke_calls.clone(),
            list_creates: list_creates.clone(),
            event_inserts: event_inserts.clone(),
            next_id: Arc::new(AtomicUsize::new(1)),
        };

        let app = Router::new()
            .route("/token", post(token))
            .route("/revoke", post(revoke))
            .route(
                "/calendars/{calendar_id}/events",
                get(list_events).post(insert_event),
            )
            .route(
                "/calendars/{calendar_id}/events/{event_id}",
                put(update_event).delete(delete_event),
            )
            .route("/users/@me/lists", get(list_tasklists).post(create_tasklist))
            .route("/lists/{list_id}/tasks", get(list_tasks).post(insert_task))
            .route(
                "/lists/{list_id}/tasks/{task_id}",
                axum::routing::patch(patch_task),
            )
            .with_state(shared);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock google");
        let addr = listener.local_addr().expect("mock addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            refresh_calls,
            revoke_calls,
            list_creates,
            event_inserts,
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn list_create_count(&self) -> usize {
        self.list_creates.load(Ordering::SeqCst)
    }
}

async fn token(State(shared): State<Shared>) -> Json<Value> {
    shared.refresh_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": "fresh-access-token",
        "expires_in": 3600,
        "token_type": "Bearer"
    }))
}

async fn revoke(State(shared): State<Shared>) -> StatusCode {
    shared.revoke_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn list_events(
    State(shared): State<Shared>,
    Path(calendar_id): Path<String>,
) -> impl IntoResponse {
    let state = shared.state.lock().unwrap();
    if state.failing_calendars.contains(&calendar_id) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "backend"})));
    }
    let items = state.events.get(&calendar_id).cloned().unwrap_or_default();
    (StatusCode::OK, Json(json!({ "items": items })))
}

async fn insert_event(
    State(shared): State<Shared>,
    Path(_calendar_id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    // Summaries containing "FAIL" simulate a per-item remote error
    if body["summary"].as_str().unwrap_or_default().contains("FAIL") {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "backend"})));
    }
    shared.event_inserts.fetch_add(1, Ordering::SeqCst);
    let id = format!("evt-created-{}", shared.next_id.fetch_add(1, Ordering::SeqCst));
    let mut event = body;
    event["id"] = json!(id);
    (StatusCode::OK, Json(event))
}

async fn update_event(
    State(shared): State<Shared>,
    Path((_calendar_id, event_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let state = shared.state.lock().unwrap();
    if state.missing_events.contains(&event_id) {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "deleted"})));
    }
    let mut event = body;
    event["id"] = json!(event_id);
    (StatusCode::OK, Json(event))
}

async fn delete_event(
    Path((_calendar_id, event_id)): Path<(String, String)>,
) -> StatusCode {
    if event_id == "already-gone" {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn list_tasklists(State(shared): State<Shared>) -> Json<Value> {
    let state = shared.state.lock().unwrap();
    let items: Vec<Value> = state
        .tasklists
        .iter()
        .map(|(id, title)| json!({"id": id, "title": title}))
        .collect();
    Json(json!({ "items": items }))
}

async fn create_tasklist(State(shared): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    shared.list_creates.fetch_add(1, Ordering::SeqCst);
    let id = format!("list-{}", shared.next_id.fetch_add(1, Ordering::SeqCst));
    let title = body["title"].as_str().unwrap_or_default().to_string();
    shared
        .state
        .lock()
        .unwrap()
        .tasklists
        .push((id.clone(), title.clone()));
    Json(json!({"id": id, "title": title}))
}

async fn list_tasks(State(shared): State<Shared>, Path(list_id): Path<String>) -> Json<Value> {
    let state = shared.state.lock().unwrap();
    let items = state.tasks.get(&list_id).cloned().unwrap_or_default();
    Json(json!({ "items": items }))
}

async fn insert_task(
    State(shared): State<Shared>,
    Path(list_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let id = format!("gtask-{}", shared.next_id.fetch_add(1, Ordering::SeqCst));
    let mut task = body;
    task["id"] = json!(id);
    shared
        .state
        .lock()
        .unwrap()
        .tasks
        .entry(list_id)
        .or_default()
        .push(task.clone());
    Json(task)
}

async fn patch_task(
    Path((_list_id, task_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut task = body;
    task["id"] = json!(task_id);
    Json(task)
}
