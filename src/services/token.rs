// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle manager.
//!
//! Owns the only mutation-guarded shared state in the sync engine: a
//! per-user refresh lease. Google invalidates the previous refresh token on
//! each use, so two concurrent refresh exchanges for one user would strand
//! one caller with a dead token. The rule is absolute: at most one refresh
//! exchange in flight per user.
//!
//! Callers that find the lease held do not queue up behind it. They wait one
//! bounded interval, re-read the credential (the winner persists the new
//! token before releasing), and either use the fresh token or fail with
//! `RefreshInProgress` for a later retry.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{KeyVersion, SyncCredential};
use crate::services::crypto::TokenCipher;
use crate::services::google::GoogleClient;
use crate::time_utils::format_utc_rfc3339;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared refresh-lease table type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// A valid access token plus whether this call performed the refresh.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub token: String,
    pub refreshed: bool,
}

/// Manages credential decryption, expiry detection, and single-flight
/// refresh per user.
#[derive(Clone)]
pub struct TokenService {
    google: GoogleClient,
    db: FirestoreDb,
    cipher: TokenCipher,
    /// In-memory cache of decrypted access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-user lease serializing token refresh operations.
    refresh_locks: RefreshLocks,
    /// How long a losing caller waits before re-reading the credential.
    refresh_wait: std::time::Duration,
}

impl TokenService {
    /// The `token_cache` and `refresh_locks` should be shared across all
    /// service instances within one process.
    pub fn new(
        google: GoogleClient,
        db: FirestoreDb,
        cipher: TokenCipher,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
        refresh_wait_ms: u64,
    ) -> Self {
        Self {
            google,
            db,
            cipher,
            token_cache,
            refresh_locks,
            refresh_wait: std::time::Duration::from_millis(refresh_wait_ms),
        }
    }

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// Fast path is the in-memory cache; otherwise the credential is read
    /// from Firestore and decrypted, and an expired token goes through the
    /// single-flight refresh protocol.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<AccessGrant, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = self.token_cache.get(user_id) {
            if now + margin < cached.expires_at {
                return Ok(AccessGrant {
                    token: cached.access_token.clone(),
                    refreshed: false,
                });
            }
            // Expired or expiring soon - fall through to refresh
        }

        let credential = self.load_usable_credential(user_id).await?;
        let expires_at = parse_expiry(&credential);

        if now + margin < expires_at {
            let access_token = self.decrypt_access(&credential)?;
            self.cache(user_id, &access_token, expires_at);
            return Ok(AccessGrant {
                token: access_token,
                refreshed: false,
            });
        }

        // Expired. Exactly one caller per user may run the exchange.
        let lease = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = match lease.try_lock() {
            Ok(_guard) => self.refresh_locked(user_id).await,
            Err(_) => self.wait_for_winner(user_id).await,
        };
        result
    }

    /// Drop cached token and lease state for a user (disconnect path).
    pub fn invalidate(&self, user_id: &str) {
        self.token_cache.remove(user_id);
        self.refresh_locks.remove(user_id);
    }

    // ─── Refresh Protocol ────────────────────────────────────────

    /// Holder of the lease: re-read, exchange, persist, cache.
    async fn refresh_locked(&self, user_id: &str) -> Result<AccessGrant, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // Re-read after acquiring the lease: another process (or a caller
        // that just released) may have already refreshed.
        let mut credential = self.load_usable_credential(user_id).await?;
        let expires_at = parse_expiry(&credential);

        if now + margin < expires_at {
            let access_token = self.decrypt_access(&credential)?;
            self.cache(user_id, &access_token, expires_at);
            return Ok(AccessGrant {
                token: access_token,
                refreshed: false,
            });
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refresh_blob = credential
            .refresh_token_encrypted
            .as_deref()
            .ok_or_else(|| AppError::CredentialMissing(user_id.to_string()))?;
        let refresh_token = self
            .cipher
            .decrypt(refresh_blob, user_id, credential.key_version)?;

        let refreshed = self.google.refresh_token(&refresh_token).await?;

        let new_expires_at = now + Duration::seconds(refreshed.expires_in);
        credential.access_token_encrypted =
            Some(self.cipher.encrypt(&refreshed.access_token, user_id)?);
        credential.access_token_expires_at = Some(format_utc_rfc3339(new_expires_at));

        // Rotate the refresh token when Google hands back a new one; the
        // re-encryption under the current scheme is what migrates v1
        // credentials forward.
        if let Some(new_refresh) = &refreshed.refresh_token {
            credential.refresh_token_encrypted = Some(self.cipher.encrypt(new_refresh, user_id)?);
            credential.key_version = KeyVersion::V2;
        }

        self.db.set_credential(&credential).await?;
        self.cache(user_id, &refreshed.access_token, new_expires_at);

        tracing::info!(user_id, "Token refreshed and stored");
        Ok(AccessGrant {
            token: refreshed.access_token,
            refreshed: true,
        })
    }

    /// Loser of the lease race: wait once, re-read, use the winner's token
    /// or fail fast for a later retry.
    async fn wait_for_winner(&self, user_id: &str) -> Result<AccessGrant, AppError> {
        tokio::time::sleep(self.refresh_wait).await;

        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let credential = self.load_usable_credential(user_id).await?;
        let expires_at = parse_expiry(&credential);

        if now + margin < expires_at {
            let access_token = self.decrypt_access(&credential)?;
            self.cache(user_id, &access_token, expires_at);
            return Ok(AccessGrant {
                token: access_token,
                refreshed: false,
            });
        }

        tracing::debug!(user_id, "Refresh still in flight after wait");
        Err(AppError::RefreshInProgress)
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// Load the credential, distinguishing "never connected / cleared" from
    /// "connected but paused".
    async fn load_usable_credential(&self, user_id: &str) -> Result<SyncCredential, AppError> {
        let credential = self
            .db
            .get_credential(user_id)
            .await?
            .ok_or_else(|| AppError::CredentialMissing(user_id.to_string()))?;

        if !credential.enabled && credential.access_token_encrypted.is_none() {
            // Disconnected: document kept for audit, tokens gone
            return Err(AppError::CredentialMissing(user_id.to_string()));
        }
        if !credential.enabled {
            return Err(AppError::SyncDisabled(user_id.to_string()));
        }
        if !credential.is_usable() {
            return Err(AppError::CredentialMissing(user_id.to_string()));
        }

        Ok(credential)
    }

    /// Access tokens are always sealed with the current scheme; only the
    /// refresh blob carries the version tag.
    fn decrypt_access(&self, credential: &SyncCredential) -> Result<String, AppError> {
        let blob = credential
            .access_token_encrypted
            .as_deref()
            .ok_or_else(|| AppError::CredentialMissing(credential.user_id.clone()))?;
        self.cipher
            .decrypt(blob, &credential.user_id, KeyVersion::V2)
    }

    fn cache(&self, user_id: &str, access_token: &str, expires_at: DateTime<Utc>) {
        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }
}

/// Stored expiry, or the epoch (forcing a refresh) when absent/unparsable.
/// The stored value is never trusted past its face value.
fn parse_expiry(credential: &SyncCredential) -> DateTime<Utc> {
    credential
        .access_token_expires_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
