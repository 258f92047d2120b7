// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

pub mod google_mock;

use planbridge::config::Config;
use planbridge::db::FirestoreDb;
use planbridge::services::{GoogleClient, SyncService, TokenCipher, TokenService};
use planbridge::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Token cipher matching `Config::test_default()` key material.
#[allow(dead_code)]
pub fn test_cipher() -> TokenCipher {
    let config = Config::test_default();
    TokenCipher::new(config.token_key_current, config.token_key_legacy)
        .expect("Failed to build test cipher")
}

/// Build a sync service around an explicit db and Google client, sharing
/// the given lease table so tests can contend on it.
#[allow(dead_code)]
pub fn test_sync_service(
    db: FirestoreDb,
    google: GoogleClient,
    refresh_locks: planbridge::services::RefreshLocks,
) -> SyncService {
    let config = Config::test_default();
    let cipher = test_cipher();
    let token_cache = Arc::new(dashmap::DashMap::new());

    let tokens = TokenService::new(
        google.clone(),
        db.clone(),
        cipher.clone(),
        token_cache,
        refresh_locks,
        config.refresh_wait_ms,
    );

    SyncService::new(&config, google, tokens, db, cipher)
}

/// Seed an enabled credential whose blobs open with `test_cipher()`.
/// `expires_in_secs` may be negative to seed an already-expired token.
#[allow(dead_code)]
pub async fn seed_credential(db: &FirestoreDb, user_id: &str, expires_in_secs: i64) {
    let cipher = test_cipher();
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(expires_in_secs);

    let credential = planbridge::models::SyncCredential {
        user_id: user_id.to_string(),
        access_token_encrypted: Some(
            cipher
                .encrypt(&format!("access-{}", user_id), user_id)
                .unwrap(),
        ),
        refresh_token_encrypted: Some(
            cipher
                .encrypt(&format!("refresh-{}", user_id), user_id)
                .unwrap(),
        ),
        key_version: planbridge::models::KeyVersion::V2,
        access_token_expires_at: Some(expires_at.to_rfc3339()),
        enabled: true,
        granted_scopes: vec![
            "https://www.googleapis.com/auth/calendar".to_string(),
            "https://www.googleapis.com/auth/tasks".to_string(),
        ],
        connected_at: chrono::Utc::now().to_rfc3339(),
    };

    db.set_credential(&credential).await.unwrap();
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let cipher = test_cipher();

    let google = GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    )
    .expect("Failed to build Google client");

    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let tokens = TokenService::new(
        google.clone(),
        db.clone(),
        cipher.clone(),
        token_cache,
        refresh_locks,
        config.refresh_wait_ms,
    );

    let sync_service = SyncService::new(&config, google, tokens, db.clone(), cipher);

    let state = Arc::new(AppState {
        config,
        db,
        sync_service,
    });

    (planbridge::routes::create_router(state.clone()), state)
}
