//! Album model

use serde::Serialize;

/// A logical album materialized from one tag group during a scan.
///
/// `path` is the album's virtual identity key, not a filesystem location.
/// `owned` is user state and survives rescans and soft-delete cycles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: i64,
    pub path: String,
    pub artist_id: i64,
    pub title: String,
    /// Distinct track extensions, sorted.
    pub formats: Vec<String>,
    pub track_count: i64,
    pub last_file_mtime: i64,
    pub owned: bool,
    pub deleted: bool,
    pub last_seen_at: i64,
    pub created_at: i64,
}
