//! Completion summary for one artist

use serde::Serialize;

use crate::models::{Album, Artist, ExpectedAlbum, ExpectedArtistSettings};

/// Owned/expected/missing reconciliation result for a single artist.
///
/// `completion_pct` treats matched, ignored, and inclusion-filtered albums
/// as complete; it is `None` when nothing is expected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub artist: Artist,
    pub settings: ExpectedArtistSettings,
    pub owned_count: usize,
    pub expected_count: usize,
    pub missing_count: usize,
    pub ignored_count: usize,
    pub completion_pct: Option<i64>,
    pub missing_albums: Vec<ExpectedAlbum>,
    pub matched_owned_count: usize,
    pub matched_owned_albums: Vec<Album>,
    pub unmatched_owned_albums: Vec<Album>,
}
