//! Internal task shape as handed to the sync engine.
//!
//! The task CRUD layer owns these records; the sync engine only reads them
//! and reports external ids back to the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The four fixed task categories the workspace product knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Focus,
    Meeting,
    Admin,
    Break,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Focus,
        Category::Meeting,
        Category::Admin,
        Category::Break,
    ];
}

/// A task as supplied by the caller for a push batch.
///
/// `external_object_id` is the caller's view of the remote link and may be
/// stale; the push path re-reads the durable link store and overrides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Scheduled start, required when pushing to a calendar
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// Scheduled end, required when pushing to a calendar
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Due date, used when pushing to the task list
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    /// Caller-supplied remote id; possibly stale
    #[serde(default)]
    pub external_object_id: Option<String>,
}
