//! Service settings singleton

use serde::Serialize;

/// The single settings row (id = 1). The music path starts from the
/// environment default and is settable through the API after first run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub music_path: String,
    pub server_id: String,
    pub updated_at: i64,
}
