//! Discography reconciliation service.
//!
//! Syncs the expected release-group set per artist from the metadata
//! client and computes owned/expected/missing summaries with the user's
//! inclusion rules, manual overrides, and alias matching.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::info;

use crate::core::musicbrainz::{MetadataClient, MetadataError};
use crate::db::tables::{
    AlbumTable, ArtistTable, ExpectedAlbumTable, ExpectedAlbumUpsert, ExpectedArtistTable,
    ExpectedIgnoredTable, ExpectedSettingsTable, OverrideTable,
};
use crate::errors::ApiError;
use crate::models::{Album, Artist, ArtistSummary, ExpectedAlbum, ExpectedArtistSettings};
use crate::utils::normalize::{is_strong_title_alias_match, normalize_title};
use crate::utils::now_millis;

/// Outer ceiling for one logical metadata operation. The client underneath
/// is already rate limited; this bounds how long a handler can hang on it.
const METADATA_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct DiscographyService {
    pool: SqlitePool,
    metadata: MetadataClient,
}

impl DiscographyService {
    pub fn new(pool: SqlitePool, metadata: MetadataClient) -> Self {
        Self { pool, metadata }
    }

    async fn resolve_artist(&self, artist_id: i64) -> Result<Artist, ApiError> {
        ArtistTable::by_id(&self.pool, artist_id)
            .await?
            .filter(|a| !a.deleted)
            .ok_or_else(|| ApiError::NotFound("artist".to_string()))
    }

    /// Refresh the expected release-group set for an artist and return the
    /// resulting summary. Resolves the MusicBrainz identity on first sync.
    pub async fn sync_expected_for_artist(&self, artist_id: i64) -> Result<ArtistSummary, ApiError> {
        let artist = self.resolve_artist(artist_id).await?;

        let existing = ExpectedArtistTable::by_artist_id(&self.pool, artist_id).await?;
        let mbid = match existing {
            Some(expected) => expected.mbid,
            None => {
                let found = timeout(
                    METADATA_CALL_TIMEOUT,
                    self.metadata.find_artist_by_name(&artist.name),
                )
                .await
                .map_err(|_| ApiError::UpstreamTimeout)?
                .map_err(map_metadata_error)?;

                match found {
                    Some(candidate) => {
                        info!(
                            "matched artist {:?} to MusicBrainz {} (score {})",
                            artist.name, candidate.mbid, candidate.score
                        );
                        candidate.mbid
                    }
                    None => {
                        return Err(ApiError::NotFound(format!(
                            "MusicBrainz artist matching \"{}\"",
                            artist.name
                        )))
                    }
                }
            }
        };

        let synced_at = now_millis();
        let expected_artist =
            ExpectedArtistTable::upsert(&self.pool, artist_id, &mbid, &artist.name, synced_at)
                .await?;

        let releases =
            timeout(METADATA_CALL_TIMEOUT, self.metadata.fetch_artist_albums(&mbid))
                .await
                .map_err(|_| ApiError::UpstreamTimeout)?
                .map_err(map_metadata_error)?;

        let upserts: Vec<ExpectedAlbumUpsert> = releases
            .into_iter()
            .map(|release| {
                let normalized_title = normalize_title(&release.title);
                ExpectedAlbumUpsert {
                    mb_release_group_id: Some(release.mb_release_group_id),
                    title: release.title,
                    normalized_title,
                    primary_type: release.primary_type,
                    secondary_types: release.secondary_types,
                    year: release.year,
                }
            })
            .collect();

        info!(
            "syncing {} expected releases for artist {:?}",
            upserts.len(),
            artist.name
        );
        ExpectedAlbumTable::replace_for_artist(&self.pool, expected_artist.id, &upserts, synced_at)
            .await?;

        self.compute_summary(artist_id).await
    }

    /// Reconcile owned albums against the expected set.
    pub async fn compute_summary(&self, artist_id: i64) -> Result<ArtistSummary, ApiError> {
        let artist = self.resolve_artist(artist_id).await?;
        let settings = ExpectedSettingsTable::get(&self.pool, artist_id).await?;
        let owned = AlbumTable::owned_active_by_artist(&self.pool, artist_id).await?;

        let expected_artist = ExpectedArtistTable::by_artist_id(&self.pool, artist_id).await?;
        let (expected, overrides, ignored_ids) = match &expected_artist {
            Some(ea) => (
                ExpectedAlbumTable::by_expected_artist(&self.pool, ea.id).await?,
                OverrideTable::for_expected_artist(&self.pool, ea.id).await?,
                ExpectedIgnoredTable::ids_for_artist(&self.pool, artist_id).await?,
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let override_by_expected: HashMap<i64, i64> =
            overrides.iter().map(|o| (o.expected_album_id, o.owned_album_id)).collect();
        let ignored: HashSet<i64> = ignored_ids.into_iter().collect();
        let owned_ids: HashSet<i64> = owned.iter().map(|a| a.id).collect();

        let mut owned_by_normalized: HashMap<String, Vec<&Album>> = HashMap::new();
        for album in &owned {
            owned_by_normalized.entry(normalize_title(&album.title)).or_default().push(album);
        }

        let mut matched_owned_ids: HashSet<i64> = HashSet::new();
        let mut missing_albums: Vec<ExpectedAlbum> = Vec::new();

        for expected_album in &expected {
            let mut matched = false;

            if let Some(owned_id) = override_by_expected.get(&expected_album.id) {
                if owned_ids.contains(owned_id) {
                    matched = true;
                    matched_owned_ids.insert(*owned_id);
                }
            }

            if !matched {
                if let Some(hits) = owned_by_normalized.get(&expected_album.normalized_title) {
                    matched = true;
                    for album in hits {
                        matched_owned_ids.insert(album.id);
                    }
                }
            }

            if !matched {
                for album in &owned {
                    if is_strong_title_alias_match(
                        &normalize_title(&album.title),
                        &expected_album.normalized_title,
                    ) {
                        matched = true;
                        matched_owned_ids.insert(album.id);
                    }
                }
            }

            if !matched
                && !ignored.contains(&expected_album.id)
                && passes_inclusion(expected_album, &settings)
            {
                missing_albums.push(expected_album.clone());
            }
        }

        let expected_count = expected.len();
        let missing_count = missing_albums.len();
        let ignored_count = expected.iter().filter(|e| ignored.contains(&e.id)).count();
        let completion_pct = if expected_count == 0 {
            None
        } else {
            let complete = (expected_count - missing_count) as f64;
            Some((complete / expected_count as f64 * 100.0).round() as i64)
        };

        let (matched_owned_albums, unmatched_owned_albums): (Vec<Album>, Vec<Album>) =
            owned.into_iter().partition(|a| matched_owned_ids.contains(&a.id));

        Ok(ArtistSummary {
            artist,
            settings,
            owned_count: owned_ids.len(),
            expected_count,
            missing_count,
            ignored_count,
            completion_pct,
            missing_albums,
            matched_owned_count: matched_owned_albums.len(),
            matched_owned_albums,
            unmatched_owned_albums,
        })
    }

    /// Idempotently drop an expected album from the missing computation.
    pub async fn ignore_expected_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), ApiError> {
        self.validate_expected_album(artist_id, expected_album_id).await?;
        ExpectedIgnoredTable::ignore(&self.pool, artist_id, expected_album_id).await?;
        Ok(())
    }

    pub async fn unignore_expected_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<(), ApiError> {
        self.validate_expected_album(artist_id, expected_album_id).await?;
        ExpectedIgnoredTable::unignore(&self.pool, artist_id, expected_album_id).await?;
        Ok(())
    }

    /// Persist inclusion rules; absent flags coerce to false.
    pub async fn update_artist_settings(
        &self,
        artist_id: i64,
        include_live: Option<bool>,
        include_compilations: Option<bool>,
    ) -> Result<ExpectedArtistSettings, ApiError> {
        self.resolve_artist(artist_id).await?;
        let settings = ExpectedArtistSettings {
            artist_id,
            include_live: include_live.unwrap_or(false),
            include_compilations: include_compilations.unwrap_or(false),
        };
        ExpectedSettingsTable::upsert(&self.pool, &settings).await?;
        Ok(settings)
    }

    pub async fn artist_settings(&self, artist_id: i64) -> Result<ExpectedArtistSettings, ApiError> {
        self.resolve_artist(artist_id).await?;
        Ok(ExpectedSettingsTable::get(&self.pool, artist_id).await?)
    }

    /// Pin an expected album to an owned album.
    pub async fn set_match_override(
        &self,
        artist_id: i64,
        expected_album_id: i64,
        owned_album_id: i64,
    ) -> Result<(), ApiError> {
        self.validate_expected_album(artist_id, expected_album_id).await?;

        let album = AlbumTable::by_id(&self.pool, owned_album_id)
            .await?
            .filter(|a| !a.deleted && a.artist_id == artist_id)
            .ok_or_else(|| ApiError::NotFound("owned album".to_string()))?;

        OverrideTable::set(&self.pool, expected_album_id, album.id).await?;
        Ok(())
    }

    pub async fn clear_match_override(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<bool, ApiError> {
        self.validate_expected_album(artist_id, expected_album_id).await?;
        Ok(OverrideTable::clear(&self.pool, expected_album_id).await?)
    }

    /// The expected album must belong to this artist's expected set.
    async fn validate_expected_album(
        &self,
        artist_id: i64,
        expected_album_id: i64,
    ) -> Result<ExpectedAlbum, ApiError> {
        self.resolve_artist(artist_id).await?;
        let expected_artist = ExpectedArtistTable::by_artist_id(&self.pool, artist_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("expected artist".to_string()))?;

        ExpectedAlbumTable::by_id(&self.pool, expected_album_id)
            .await?
            .filter(|album| album.expected_artist_id == expected_artist.id)
            .ok_or_else(|| ApiError::NotFound("expected album".to_string()))
    }
}

fn passes_inclusion(album: &ExpectedAlbum, settings: &ExpectedArtistSettings) -> bool {
    let compilation_ok = settings.include_compilations
        || album
            .primary_type
            .as_deref()
            .map(|t| t.to_lowercase() != "compilation")
            .unwrap_or(true);
    let live_ok = settings.include_live
        || !album.secondary_types.iter().any(|t| t.to_lowercase() == "live");
    compilation_ok && live_ok
}

fn map_metadata_error(err: MetadataError) -> ApiError {
    match err {
        MetadataError::Timeout => ApiError::UpstreamTimeout,
        MetadataError::Http { status, body } => {
            ApiError::Upstream { status: Some(status), details: body }
        }
        other => ApiError::Upstream { status: None, details: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::db::engine::connect_memory;
    use crate::db::tables::{AlbumUpsert, ArtistTable};

    async fn seed_artist(pool: &SqlitePool, name: &str) -> Artist {
        ArtistTable::upsert_seen(pool, name, &crate::utils::normalize::slugify(name), 100)
            .await
            .unwrap()
    }

    async fn seed_owned_album(pool: &SqlitePool, artist_id: i64, title: &str) -> i64 {
        AlbumTable::upsert(
            pool,
            &AlbumUpsert {
                path: format!("/m/a/.crate/{}", crate::utils::normalize::slugify(title)),
                artist_id,
                title: title.to_string(),
                formats: vec!["mp3".into()],
                track_count: 10,
                last_file_mtime: 100,
                seen_at: 100,
            },
        )
        .await
        .unwrap()
    }

    async fn seed_expected(
        pool: &SqlitePool,
        artist_id: i64,
        releases: &[(&str, &str, &[&str])],
    ) -> i64 {
        let expected_artist = ExpectedArtistTable::upsert(pool, artist_id, "mbid-x", "X", 100)
            .await
            .unwrap();
        let upserts: Vec<ExpectedAlbumUpsert> = releases
            .iter()
            .enumerate()
            .map(|(i, (title, primary, secondary))| ExpectedAlbumUpsert {
                mb_release_group_id: Some(format!("rg-{i}")),
                title: title.to_string(),
                normalized_title: normalize_title(title),
                primary_type: Some(primary.to_string()),
                secondary_types: secondary.iter().map(|s| s.to_string()).collect(),
                year: Some(2000),
            })
            .collect();
        ExpectedAlbumTable::replace_for_artist(pool, expected_artist.id, &upserts, 100)
            .await
            .unwrap();
        expected_artist.id
    }

    fn service(pool: &SqlitePool) -> DiscographyService {
        // the client is unused in pure summary tests
        DiscographyService::new(pool.clone(), MetadataClient::with_base("http://127.0.0.1:9", "test"))
    }

    #[tokio::test]
    async fn summary_matches_normalized_aliases_and_filters_live() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "New Found Glory").await;
        seed_owned_album(&pool, artist.id, "Sticks and Stones").await;
        seed_owned_album(&pool, artist.id, "Coming Home").await;
        seed_expected(
            &pool,
            artist.id,
            &[
                ("Sticks and Stones", "Album", &[]),
                ("Sticks & Stones", "Album", &[]),
                ("Catalyst", "Album", &[]),
                ("Live EP", "Album", &["Live"]),
            ],
        )
        .await;

        let summary = service(&pool).compute_summary(artist.id).await.unwrap();

        assert_eq!(summary.owned_count, 2);
        assert_eq!(summary.expected_count, 4);
        assert_eq!(summary.missing_count, 1);
        assert_eq!(summary.missing_albums[0].title, "Catalyst");
        assert_eq!(summary.completion_pct, Some(75));
        assert_eq!(summary.matched_owned_count, 1);
        assert_eq!(summary.matched_owned_albums[0].title, "Sticks and Stones");
        assert_eq!(summary.unmatched_owned_albums.len(), 1);
        assert_eq!(summary.unmatched_owned_albums[0].title, "Coming Home");
    }

    #[tokio::test]
    async fn include_live_surfaces_live_records_as_missing() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;
        seed_expected(&pool, artist.id, &[("Live at Yurt", "Album", &["Live"])]).await;

        let svc = service(&pool);
        let summary = svc.compute_summary(artist.id).await.unwrap();
        assert_eq!(summary.missing_count, 0);

        svc.update_artist_settings(artist.id, Some(true), None).await.unwrap();
        let summary = svc.compute_summary(artist.id).await.unwrap();
        assert_eq!(summary.missing_count, 1);
    }

    #[tokio::test]
    async fn compilations_are_excluded_until_opted_in() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;
        seed_expected(&pool, artist.id, &[("Greatest Hits Forever", "Compilation", &[])]).await;

        let svc = service(&pool);
        assert_eq!(svc.compute_summary(artist.id).await.unwrap().missing_count, 0);

        svc.update_artist_settings(artist.id, None, Some(true)).await.unwrap();
        assert_eq!(svc.compute_summary(artist.id).await.unwrap().missing_count, 1);
    }

    #[tokio::test]
    async fn strong_alias_containment_counts_as_matched() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;
        seed_owned_album(&pool, artist.id, "The Dark Side of the Moon").await;
        seed_expected(&pool, artist.id, &[("Dark Side of the Moon", "Album", &[])]).await;

        let summary = service(&pool).compute_summary(artist.id).await.unwrap();
        assert_eq!(summary.missing_count, 0);
        assert_eq!(summary.matched_owned_count, 1);
    }

    #[tokio::test]
    async fn ignored_albums_leave_the_missing_list_but_count_separately() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;
        let expected_artist_id = seed_expected(
            &pool,
            artist.id,
            &[("One", "Album", &[]), ("Two", "Album", &[])],
        )
        .await;
        let expected = ExpectedAlbumTable::by_expected_artist(&pool, expected_artist_id)
            .await
            .unwrap();

        let svc = service(&pool);
        svc.ignore_expected_album(artist.id, expected[0].id).await.unwrap();
        svc.ignore_expected_album(artist.id, expected[0].id).await.unwrap();

        let summary = svc.compute_summary(artist.id).await.unwrap();
        assert_eq!(summary.missing_count, 1);
        assert_eq!(summary.ignored_count, 1);
        // ignored albums still count toward completion
        assert_eq!(summary.completion_pct, Some(50));

        svc.unignore_expected_album(artist.id, expected[0].id).await.unwrap();
        assert_eq!(svc.compute_summary(artist.id).await.unwrap().missing_count, 2);
    }

    #[tokio::test]
    async fn override_pins_an_otherwise_unmatched_pair() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;
        let owned_id = seed_owned_album(&pool, artist.id, "Completely Different Name").await;
        let expected_artist_id = seed_expected(&pool, artist.id, &[("Self Titled", "Album", &[])])
            .await;
        let expected = ExpectedAlbumTable::by_expected_artist(&pool, expected_artist_id)
            .await
            .unwrap();

        let svc = service(&pool);
        svc.set_match_override(artist.id, expected[0].id, owned_id).await.unwrap();

        let summary = svc.compute_summary(artist.id).await.unwrap();
        assert_eq!(summary.missing_count, 0);
        assert_eq!(summary.matched_owned_count, 1);

        assert!(svc.clear_match_override(artist.id, expected[0].id).await.unwrap());
        assert_eq!(svc.compute_summary(artist.id).await.unwrap().missing_count, 1);
    }

    #[tokio::test]
    async fn ignore_rejects_foreign_expected_albums() {
        let pool = connect_memory().await.unwrap();
        let artist_a = seed_artist(&pool, "A").await;
        let artist_b = seed_artist(&pool, "B").await;
        let ea_a = seed_expected(&pool, artist_a.id, &[("One", "Album", &[])]).await;
        ExpectedArtistTable::upsert(&pool, artist_b.id, "mbid-b", "B", 100).await.unwrap();
        let albums = ExpectedAlbumTable::by_expected_artist(&pool, ea_a).await.unwrap();

        let err = service(&pool)
            .ignore_expected_album(artist_b.id, albums[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn summary_for_unknown_artist_is_not_found() {
        let pool = connect_memory().await.unwrap();
        let err = service(&pool).compute_summary(4242).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn sync_resolves_identity_and_stores_expected_albums() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "New Found Glory").await;
        seed_owned_album(&pool, artist.id, "Sticks and Stones").await;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist");
                then.status(200).json_body(serde_json::json!({
                    "artists": [
                        { "id": "mbid-nfg", "name": "New Found Glory", "score": 100 }
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/release-group");
                then.status(200).json_body(serde_json::json!({
                    "release-group-count": 2,
                    "release-groups": [
                        {
                            "id": "rg-1", "title": "Sticks and Stones",
                            "primary-type": "Album", "secondary-types": [],
                            "first-release-date": "2002-06-11"
                        },
                        {
                            "id": "rg-2", "title": "Catalyst",
                            "primary-type": "Album", "secondary-types": [],
                            "first-release-date": "2004-05-18"
                        }
                    ]
                }));
            })
            .await;

        let svc = DiscographyService::new(
            pool.clone(),
            MetadataClient::with_base(&server.base_url(), "test"),
        );
        let summary = svc.sync_expected_for_artist(artist.id).await.unwrap();

        assert_eq!(summary.expected_count, 2);
        assert_eq!(summary.missing_count, 1);
        assert_eq!(summary.missing_albums[0].title, "Catalyst");

        let expected_artist =
            ExpectedArtistTable::by_artist_id(&pool, artist.id).await.unwrap().unwrap();
        assert_eq!(expected_artist.mbid, "mbid-nfg");
    }

    #[tokio::test]
    async fn sync_surfaces_upstream_failures_with_details() {
        let pool = connect_memory().await.unwrap();
        let artist = seed_artist(&pool, "X").await;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artist");
                then.status(500).body("upstream exploded");
            })
            .await;

        let svc = DiscographyService::new(
            pool.clone(),
            MetadataClient::with_base(&server.base_url(), "test"),
        );
        let err = svc.sync_expected_for_artist(artist.id).await.unwrap_err();
        match err {
            ApiError::Upstream { status, details } => {
                assert_eq!(status, Some(500));
                assert!(details.contains("upstream exploded"));
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }
}
