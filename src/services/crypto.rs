// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AEAD cipher for OAuth tokens at rest.
//!
//! Two sealed-blob schemes coexist while old credentials migrate:
//! - `V2` (current): AES-256-GCM under an HKDF-SHA256 per-user subkey, with
//!   the user id bound as additional authenticated data. A blob copied onto
//!   another user's credential fails to open.
//! - `V1` (legacy): AES-256-GCM under the legacy master key directly, no AAD.
//!
//! Which scheme opens a blob is decided by the `key_version` tag stored next
//! to it, never by sniffing the blob format.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::error::AppError;
use crate::models::KeyVersion;

/// HKDF info label for per-user subkey derivation.
const SUBKEY_INFO: &[u8] = b"planbridge/token-cipher/v2";

/// Token cipher holding the current master key and, optionally, the legacy
/// key needed to open `V1` blobs.
#[derive(Clone)]
pub struct TokenCipher {
    current_key: Vec<u8>,
    legacy_key: Option<Vec<u8>>,
    rng: SystemRandom,
}

impl TokenCipher {
    pub fn new(current_key: Vec<u8>, legacy_key: Option<Vec<u8>>) -> Result<Self, AppError> {
        if current_key.len() != 32 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Current token key must be 32 bytes"
            )));
        }
        if let Some(key) = &legacy_key {
            if key.len() != 32 {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Legacy token key must be 32 bytes"
                )));
            }
        }

        Ok(Self {
            current_key,
            legacy_key,
            rng: SystemRandom::new(),
        })
    }

    /// Seal a token under the current scheme. Returns a base64 blob of
    /// `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &str, user_id: &str) -> Result<String, AppError> {
        let key = derive_subkey(&self.current_key, user_id)?;
        let sealing = aead_key(&key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("RNG failure")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buffer = plaintext.as_bytes().to_vec();
        sealing
            .seal_in_place_append_tag(nonce, Aad::from(user_id.as_bytes()), &mut buffer)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("AEAD seal failed")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + buffer.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&buffer);
        Ok(BASE64.encode(blob))
    }

    /// Open a blob sealed with the scheme named by `version`.
    pub fn decrypt(
        &self,
        blob_b64: &str,
        user_id: &str,
        version: KeyVersion,
    ) -> Result<String, AppError> {
        match version {
            KeyVersion::V2 => {
                let key = derive_subkey(&self.current_key, user_id)?;
                open_blob(&key, blob_b64, user_id.as_bytes())
            }
            KeyVersion::V1 => {
                let key = self.legacy_key.as_deref().ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "Legacy-tagged blob but no legacy key configured"
                    ))
                })?;
                open_blob(key, blob_b64, &[])
            }
        }
    }
}

/// Derive the per-user AES-256 subkey from the master key.
fn derive_subkey(master: &[u8], user_id: &str) -> Result<[u8; 32], AppError> {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = [0u8; 32];
    hk.expand_multi_info(&[SUBKEY_INFO, user_id.as_bytes()], &mut okm)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("HKDF expand failed")))?;
    Ok(okm)
}

fn aead_key(key: &[u8]) -> Result<LessSafeKey, AppError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid AEAD key length")))?;
    Ok(LessSafeKey::new(unbound))
}

fn open_blob(key: &[u8], blob_b64: &str, aad: &[u8]) -> Result<String, AppError> {
    let blob = BASE64
        .decode(blob_b64)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Blob base64 decode failed: {}", e)))?;

    if blob.len() <= NONCE_LEN {
        return Err(AppError::Internal(anyhow::anyhow!("Blob too short")));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Bad nonce")))?;

    let opening = aead_key(key)?;
    let mut buffer = ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(nonce, Aad::from(aad), &mut buffer)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("AEAD open failed")))?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
}

/// Seal a `V1` blob with the legacy key. Test-only: production code never
/// writes new legacy blobs.
#[cfg(any(test, debug_assertions))]
pub fn encrypt_legacy(legacy_key: &[u8], plaintext: &str) -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("RNG failure")))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let sealing = aead_key(legacy_key)?;
    let mut buffer = plaintext.as_bytes().to_vec();
    sealing
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut buffer)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("AEAD seal failed")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + buffer.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&buffer);
    Ok(BASE64.encode(blob))
}
