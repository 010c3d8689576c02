//! Expected-discography models

use serde::Serialize;

/// Link between a library artist and its MusicBrainz identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtist {
    pub id: i64,
    pub artist_id: i64,
    pub mbid: String,
    pub name: String,
    pub updated_at: i64,
}

/// One release-group the artist is expected to have, as synced from the
/// metadata service. Rows not refreshed by a sync are pruned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAlbum {
    pub id: i64,
    pub expected_artist_id: i64,
    pub mb_release_group_id: Option<String>,
    pub title: String,
    pub normalized_title: String,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub year: Option<i64>,
    pub updated_at: i64,
}

/// Per-artist inclusion rules for the missing-albums computation. Both
/// flags default to false: live records and compilations stay out of the
/// missing list until the user opts in.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtistSettings {
    pub artist_id: i64,
    pub include_live: bool,
    pub include_compilations: bool,
}

impl ExpectedArtistSettings {
    pub fn defaults_for(artist_id: i64) -> Self {
        Self { artist_id, include_live: false, include_compilations: false }
    }
}

/// Manual 1:1 pin between an expected album and an owned album.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMatchOverride {
    pub id: i64,
    pub expected_album_id: i64,
    pub owned_album_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistAlbum {
    pub id: i64,
    pub expected_album_id: i64,
    pub status: String,
    pub created_at: i64,
}

/// Legacy user-entered wanted album, predating the metadata-driven
/// expected path. Kept for the artist overview surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedAlbum {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub source: String,
}

/// Legacy alternate title for an owned album.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumAlias {
    pub id: i64,
    pub album_id: i64,
    pub alias: String,
}
