//! Per-user Google credential, stored encrypted in Firestore.

use serde::{Deserialize, Serialize};

/// Encryption scheme tag carried by the stored refresh-token ciphertext.
///
/// `V1` blobs were sealed with the legacy master key directly; `V2` blobs use
/// a per-user subkey with the user id bound as AAD. Both must stay decryptable
/// until every credential has rotated through a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyVersion {
    V1,
    #[default]
    V2,
}

/// One Google OAuth credential per user (document id = user id).
///
/// On disconnect the document is cleared in place (every Option set to None,
/// `enabled` false) rather than deleted, so the connection history survives
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCredential {
    /// Owning workspace user
    pub user_id: String,
    /// Encrypted access token (base64 AEAD blob, always current scheme)
    pub access_token_encrypted: Option<String>,
    /// Encrypted refresh token (base64 AEAD blob)
    pub refresh_token_encrypted: Option<String>,
    /// Scheme the refresh-token blob was sealed with
    pub key_version: KeyVersion,
    /// When the access token expires (RFC3339)
    pub access_token_expires_at: Option<String>,
    /// Whether sync runs for this user; false means no-op, not error
    pub enabled: bool,
    /// OAuth scopes granted at connect time
    pub granted_scopes: Vec<String>,
    /// When the user first connected (RFC3339)
    pub connected_at: String,
}

impl SyncCredential {
    /// A credential is usable only while enabled with both blobs present.
    pub fn is_usable(&self) -> bool {
        self.enabled
            && self.access_token_encrypted.is_some()
            && self.refresh_token_encrypted.is_some()
    }

    /// Clear all token material in place, keeping the document for audit.
    pub fn clear(&mut self) {
        self.access_token_encrypted = None;
        self.refresh_token_encrypted = None;
        self.access_token_expires_at = None;
        self.granted_scopes.clear();
        self.enabled = false;
    }
}
