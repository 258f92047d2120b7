//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// One encrypted Google credential per user (keyed by user id)
    pub const SYNC_CREDENTIALS: &str = "sync_credentials";
    /// Task <-> remote object links (keyed by task id + encoded container id)
    pub const EXTERNAL_LINKS: &str = "external_links";
}
