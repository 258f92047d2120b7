// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Sync credentials (encrypted OAuth tokens, one document per user)
//! - External links (task <-> remote object associations)
//!
//! The sync engine reads links but never writes them; `set_link` exists for
//! the task CRUD layer, which persists link updates through its own
//! versioned save path after a push returns.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ExternalLink, SyncCredential};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the sync credential for a user.
    pub async fn get_credential(&self, user_id: &str) -> Result<Option<SyncCredential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SYNC_CREDENTIALS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store (create or overwrite) the sync credential for a user.
    pub async fn set_credential(&self, credential: &SyncCredential) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SYNC_CREDENTIALS)
            .document_id(&credential.user_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Clear the credential in place (disconnect). The document survives with
    /// every token field nulled and `enabled=false`; it is never deleted.
    pub async fn clear_credential(&self, user_id: &str) -> Result<(), AppError> {
        let Some(mut credential) = self.get_credential(user_id).await? else {
            return Ok(());
        };

        credential.clear();
        self.set_credential(&credential).await
    }

    // ─── External Link Operations ────────────────────────────────

    /// Get the link for one (task, container) pair.
    pub async fn get_link(
        &self,
        internal_task_id: &str,
        container_id: &str,
    ) -> Result<Option<ExternalLink>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EXTERNAL_LINKS)
            .obj()
            .one(&ExternalLink::doc_id(internal_task_id, container_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch links for a batch of task ids within one container.
    ///
    /// Uses concurrent point reads with a limit to avoid overloading
    /// Firestore. Missing links are simply absent from the result.
    pub async fn get_links_for_tasks(
        &self,
        internal_task_ids: &[String],
        container_id: &str,
    ) -> Result<Vec<ExternalLink>, AppError> {
        let client = self.get_client()?;
        let container_id = container_id.to_string();

        let links: Vec<Result<Option<ExternalLink>, AppError>> =
            stream::iter(internal_task_ids.to_vec())
                .map(|task_id| {
                    let container_id = container_id.clone();
                    async move {
                        client
                            .fluent()
                            .select()
                            .by_id_in(collections::EXTERNAL_LINKS)
                            .obj()
                            .one(&ExternalLink::doc_id(&task_id, &container_id))
                            .await
                            .map_err(|e| AppError::Database(e.to_string()))
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_DB_OPS)
                .collect()
                .await;

        let mut found = Vec::new();
        for link in links {
            if let Some(link) = link? {
                found.push(link);
            }
        }
        Ok(found)
    }

    /// Store a link. Called by the task CRUD layer's save path, not by the
    /// push synchronizer.
    pub async fn set_link(&self, link: &ExternalLink) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EXTERNAL_LINKS)
            .document_id(&ExternalLink::doc_id(
                &link.internal_task_id,
                &link.external_container_id,
            ))
            .object(link)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a link (task deleted internally or remote object removed).
    pub async fn delete_link(
        &self,
        internal_task_id: &str,
        container_id: &str,
    ) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::EXTERNAL_LINKS)
            .document_id(&ExternalLink::doc_id(internal_task_id, container_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
