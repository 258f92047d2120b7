//! Application configuration loaded from environment variables.
//!
//! Secrets (OAuth client secret, signing keys, token encryption keys) are
//! read once at startup. In production they arrive as env vars via Cloud Run
//! secret bindings.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// OAuth redirect URL registered with Google
    pub oauth_redirect_url: String,
    /// Frontend URL for post-OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// How long a caller waits for a concurrent refresh before giving up (ms)
    pub refresh_wait_ms: u64,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Current token-encryption master key (32 bytes)
    pub token_key_current: Vec<u8>,
    /// Legacy token-encryption key, kept until all credentials migrate off v1
    pub token_key_legacy: Option<Vec<u8>>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            oauth_redirect_url: env::var("OAUTH_REDIRECT_URL")
                .unwrap_or_else(|_| "http://localhost:8080/auth/google/callback".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            refresh_wait_ms: env::var("REFRESH_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(800),

            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            token_key_current: decode_key("TOKEN_KEY_CURRENT")?
                .ok_or(ConfigError::Missing("TOKEN_KEY_CURRENT"))?,
            token_key_legacy: decode_key("TOKEN_KEY_LEGACY")?,
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            oauth_redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            refresh_wait_ms: 50,
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            token_key_current: vec![0x42; 32],
            token_key_legacy: Some(vec![0x24; 32]),
        }
    }
}

/// Decode a hex-encoded 32-byte key from an env var. Returns Ok(None) when
/// the variable is unset.
fn decode_key(name: &'static str) -> Result<Option<Vec<u8>>, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };

    let bytes = hex::decode(raw.trim()).map_err(|_| ConfigError::Invalid(name))?;
    if bytes.len() != 32 {
        return Err(ConfigError::Invalid(name));
    }
    Ok(Some(bytes))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Malformed value for environment variable: {0}")]
    Invalid(&'static str),
}
