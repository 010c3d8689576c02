//! Track model

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i64,
    pub path: String,
    pub album_id: i64,
    pub ext: String,
    pub mtime: i64,
    pub deleted: bool,
    pub last_seen_at: i64,
}
