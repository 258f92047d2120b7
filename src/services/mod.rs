// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod codec;
pub mod crypto;
pub mod google;
pub mod sync;
pub mod token;

pub use crypto::TokenCipher;
pub use google::GoogleClient;
pub use sync::{PushReport, SyncService, SyncTarget};
pub use token::{AccessGrant, RefreshLocks, TokenCache, TokenService};
