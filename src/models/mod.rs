// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod link;
pub mod task;

pub use credential::{KeyVersion, SyncCredential};
pub use link::ExternalLink;
pub use task::{Category, InternalTask};
