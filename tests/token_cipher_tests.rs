// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tests for the versioned token cipher: user binding and the legacy
//! scheme fallback that keeps pre-migration credentials readable.

use planbridge::models::KeyVersion;
use planbridge::services::crypto::{encrypt_legacy, TokenCipher};

mod common;
use common::test_cipher;

#[test]
fn test_blob_bound_to_owning_user() {
    let cipher = test_cipher();

    let blob = cipher.encrypt("ya29.access", "user-a").unwrap();
    assert_eq!(
        cipher.decrypt(&blob, "user-a", KeyVersion::V2).unwrap(),
        "ya29.access"
    );

    // Same blob presented for a different user must not open
    assert!(cipher.decrypt(&blob, "user-b", KeyVersion::V2).is_err());
}

#[test]
fn test_v1_tag_routes_to_legacy_key() {
    let cipher = test_cipher();
    let legacy_key = vec![0x24; 32]; // matches Config::test_default()

    let blob = encrypt_legacy(&legacy_key, "1//refresh-from-2023").unwrap();

    // v1 tag opens it; v2 tag must not, even though both schemes are AES-GCM
    assert_eq!(
        cipher.decrypt(&blob, "user-a", KeyVersion::V1).unwrap(),
        "1//refresh-from-2023"
    );
    assert!(cipher.decrypt(&blob, "user-a", KeyVersion::V2).is_err());
}

#[test]
fn test_v1_without_configured_legacy_key_fails() {
    let cipher = TokenCipher::new(vec![0x42; 32], None).unwrap();
    let blob = encrypt_legacy(&[0x24; 32], "1//refresh").unwrap();
    assert!(cipher.decrypt(&blob, "user-a", KeyVersion::V1).is_err());
}

#[test]
fn test_blobs_are_nondeterministic() {
    // Fresh nonce per seal: same plaintext, different blobs
    let cipher = test_cipher();
    let a = cipher.encrypt("token", "user-a").unwrap();
    let b = cipher.encrypt("token", "user-a").unwrap();
    assert_ne!(a, b);
}
