// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push synchronizer tests: idempotent create-vs-update, stale-state
//! override, and per-item failure isolation.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use planbridge::error::AppError;
use planbridge::models::{Category, ExternalLink, InternalTask};
use planbridge::services::sync::PushAction;
use planbridge::services::{GoogleClient, SyncTarget};

mod common;
use common::google_mock::{MockGoogle, MockState};
use common::{seed_credential, test_db, test_sync_service};

fn mock_client(mock: &MockGoogle) -> GoogleClient {
    GoogleClient::new("client-id".to_string(), "client-secret".to_string())
        .unwrap()
        .with_base_urls(&mock.base_url, &mock.base_url, &mock.base_url)
}

fn task(id: &str, title: &str) -> InternalTask {
    InternalTask {
        id: id.to_string(),
        title: title.to_string(),
        notes: None,
        category: Some(Category::Focus),
        starts_at: Some(Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap()),
        ends_at: Some(Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap()),
        due_date: None,
        completed: false,
        external_object_id: None,
    }
}

#[tokio::test]
async fn test_second_push_updates_instead_of_creating() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-1";
    seed_credential(&db, user_id, 3600).await;

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db.clone(), mock_client(&mock), locks);
    let target = SyncTarget::Calendar("cal-main".to_string());

    // First push: no link anywhere, so the task is created remotely
    let first = service
        .push_tasks(user_id, vec![task("t1", "Write report")], target.clone())
        .await
        .unwrap();
    assert_eq!(first.results.len(), 1);
    assert_eq!(first.results[0].action, PushAction::Created);
    let external_id = first.results[0].external_object_id.clone();

    // The caller persists the link through its own save path
    db.set_link(&ExternalLink {
        internal_task_id: "t1".to_string(),
        external_object_id: external_id.clone(),
        external_container_id: "cal-main".to_string(),
        category: Some(Category::Focus),
    })
    .await
    .unwrap();

    // Second push with no intervening change: update, never a duplicate
    let second = service
        .push_tasks(user_id, vec![task("t1", "Write report")], target)
        .await
        .unwrap();
    assert_eq!(second.results.len(), 1);
    assert_eq!(second.results[0].action, PushAction::Updated);
    assert_eq!(second.results[0].external_object_id, external_id);

    assert_eq!(mock.event_inserts.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_durable_link_overrides_stale_caller_id() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-2";
    seed_credential(&db, user_id, 3600).await;

    // A sync from another client already linked t2 -> evt-from-other-client
    db.set_link(&ExternalLink {
        internal_task_id: "t2".to_string(),
        external_object_id: "evt-from-other-client".to_string(),
        external_container_id: "cal-main".to_string(),
        category: None,
    })
    .await
    .unwrap();

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);

    // The caller's view is stale: it thinks the task was never pushed
    let report = service
        .push_tasks(
            user_id,
            vec![task("t2", "Plan offsite")],
            SyncTarget::Calendar("cal-main".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].action, PushAction::Updated);
    assert_eq!(
        report.results[0].external_object_id,
        "evt-from-other-client"
    );
    // No duplicate creation despite the stale caller state
    assert_eq!(mock.event_inserts.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_failing_item_does_not_abort_batch() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-3";
    seed_credential(&db, user_id, 3600).await;

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);

    let tasks = vec![
        task("t1", "One"),
        task("t2", "Two"),
        task("t3", "FAIL this one"), // mock answers 503
        task("t4", "Four"),
        task("t5", "Five"),
    ];

    let report = service
        .push_tasks(
            user_id,
            tasks,
            SyncTarget::Calendar("cal-main".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(report.results.len(), 4);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].internal_task_id, "t3");
    assert!(report.errors[0].transient);
}

#[tokio::test]
async fn test_every_item_failing_is_call_level_failure() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-4";
    seed_credential(&db, user_id, 3600).await;

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);

    let result = service
        .push_tasks(
            user_id,
            vec![task("t1", "FAIL one"), task("t2", "FAIL two")],
            SyncTarget::Calendar("cal-main".to_string()),
        )
        .await;

    assert!(matches!(result, Err(AppError::BatchFailed(2))));
}

#[tokio::test]
async fn test_update_of_deleted_event_recreates() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState {
        missing_events: vec!["evt-deleted-remotely".to_string()],
        ..Default::default()
    })
    .await;

    let user_id = "push-user-5";
    seed_credential(&db, user_id, 3600).await;

    db.set_link(&ExternalLink {
        internal_task_id: "t6".to_string(),
        external_object_id: "evt-deleted-remotely".to_string(),
        external_container_id: "cal-main".to_string(),
        category: None,
    })
    .await
    .unwrap();

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);

    let report = service
        .push_tasks(
            user_id,
            vec![task("t6", "Rescheduled")],
            SyncTarget::Calendar("cal-main".to_string()),
        )
        .await
        .unwrap();

    // Dangling link: the update 404s and the task is re-created
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].action, PushAction::Created);
    assert_ne!(
        report.results[0].external_object_id,
        "evt-deleted-remotely"
    );
}

#[tokio::test]
async fn test_task_without_times_is_per_item_error() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-6";
    seed_credential(&db, user_id, 3600).await;

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);

    let mut unscheduled = task("t7", "Someday");
    unscheduled.starts_at = None;
    unscheduled.ends_at = None;

    let report = service
        .push_tasks(
            user_id,
            vec![unscheduled, task("t8", "Now")],
            SyncTarget::Calendar("cal-main".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].internal_task_id, "t8");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].internal_task_id, "t7");
    assert!(!report.errors[0].transient);
}

#[tokio::test]
async fn test_idempotent_remote_delete() {
    require_emulator!();
    let db = test_db().await;
    let mock = MockGoogle::start(MockState::default()).await;

    let user_id = "push-user-7";
    seed_credential(&db, user_id, 3600).await;

    let locks = Arc::new(dashmap::DashMap::new());
    let service = test_sync_service(db, mock_client(&mock), locks);
    let target = SyncTarget::Calendar("cal-main".to_string());

    // Mock answers 404 for this id; delete still reports success
    service
        .delete_remote(user_id, &target, "already-gone")
        .await
        .unwrap();
}
