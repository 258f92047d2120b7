// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Planbridge: keep workspace tasks in step with Google Calendar and Tasks.
//!
//! This crate provides the sync engine behind the workspace product's
//! Google integration: OAuth credential lifecycle, single-flight token
//! refresh, idempotent task push, and windowed calendar/task pull.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::SyncService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub sync_service: SyncService,
}
