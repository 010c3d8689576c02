//! Artist model

use serde::Serialize;

/// A top-level library directory. Never hard-deleted in normal flow; a full
/// scan that no longer sees the directory soft-deletes the row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub deleted: bool,
    pub last_seen_at: i64,
    pub created_at: i64,
}
