//! Durable association between an internal task and a remote Google object.

use serde::{Deserialize, Serialize};

use crate::models::task::Category;

/// One link per (internal task, remote container). The link is the sole
/// basis for the update-vs-create decision on the next push, so the push
/// path re-reads links before every batch instead of trusting the caller's
/// copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    /// Internal task id
    pub internal_task_id: String,
    /// Remote event id or remote task id
    pub external_object_id: String,
    /// Calendar id or task-list id the object lives in
    pub external_container_id: String,
    /// Category recorded when the link was made
    pub category: Option<Category>,
}

impl ExternalLink {
    /// Firestore document id for a link. Container ids can contain
    /// characters Firestore rejects in ids, so they are percent-encoded.
    pub fn doc_id(internal_task_id: &str, container_id: &str) -> String {
        format!(
            "{}_{}",
            internal_task_id,
            urlencoding::encode(container_id)
        )
    }
}
