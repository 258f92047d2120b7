// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth connection routes.
//!
//! The connect flow starts from an authenticated session (the user is
//! already logged into the workspace); the signed state parameter carries
//! the user id across the round trip to Google, so the public callback can
//! attribute the grant without trusting anything Google echoes back.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Extension, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Scopes requested at connect time: calendar events plus the task list.
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/calendar \
                            https://www.googleapis.com/auth/tasks";

/// Signed-state lifetime. A callback arriving later than this is rejected.
const STATE_MAX_AGE_MILLIS: u128 = 15 * 60 * 1000;

/// Public callback route; the connect entry point is mounted behind the
/// session middleware in routes/mod.rs.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google/callback", get(auth_callback))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google/connect", get(auth_start))
}

/// Start OAuth flow - redirect to Google's consent page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let oauth_state = sign_state(&user.user_id, timestamp, &state.config.oauth_state_key)?;

    // access_type=offline + prompt=consent forces Google to mint a refresh
    // token even for repeat grants.
    let auth_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope={}&\
         access_type=offline&\
         prompt=consent&\
         state={}",
        state.config.google_client_id,
        urlencoding::encode(&state.config.oauth_redirect_url),
        urlencoding::encode(OAUTH_SCOPES),
        oauth_state
    );

    tracing::info!(
        user_id = %user.user_id,
        "Starting Google OAuth flow"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - verify state, exchange code, store the credential.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let frontend_url = &state.config.frontend_url;

    let Some(user_id) = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
    else {
        tracing::warn!("Invalid or expired OAuth state parameter");
        let redirect = format!("{}/settings/integrations?error=invalid_state", frontend_url);
        return Ok(Redirect::temporary(&redirect));
    };

    // User declined on the consent page
    if let Some(error) = params.error {
        tracing::warn!(user_id = %user_id, error = %error, "OAuth error from Google");
        let redirect = format!("{}/settings/integrations?error={}", frontend_url, error);
        return Ok(Redirect::temporary(&redirect));
    }

    let Some(code) = params.code else {
        return Err(AppError::BadRequest("Missing authorization code".to_string()));
    };

    state
        .sync_service
        .handle_oauth_callback(&user_id, &code)
        .await?;

    tracing::info!(user_id = %user_id, "Google account connected");

    let redirect = format!("{}/settings/integrations?connected=google", frontend_url);
    Ok(Redirect::temporary(&redirect))
}

/// Build the signed state: `user_id|timestamp_hex|signature_hex`, base64url.
fn sign_state(user_id: &str, timestamp: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", user_id, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature and freshness, returning the user id.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "user_id|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let user_id = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", user_id, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if expected
        .as_bytes()
        .ct_eq(signature_hex.as_bytes())
        .unwrap_u8()
        != 1
    {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis();
    if now.saturating_sub(issued_at) > STATE_MAX_AGE_MILLIS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(user_id.to_string())
}
