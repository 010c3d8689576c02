//! Expected-discography table operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::{ExpectedAlbum, ExpectedArtist, ExpectedArtistSettings};

#[derive(Debug, FromRow)]
struct ExpectedArtistRow {
    id: i64,
    artist_id: i64,
    mbid: String,
    name: String,
    updated_at: i64,
}

impl ExpectedArtistRow {
    fn into_model(self) -> ExpectedArtist {
        ExpectedArtist {
            id: self.id,
            artist_id: self.artist_id,
            mbid: self.mbid,
            name: self.name,
            updated_at: self.updated_at,
        }
    }
}

pub struct ExpectedArtistTable;

impl ExpectedArtistTable {
    pub async fn upsert(
        pool: &SqlitePool,
        artist_id: i64,
        mbid: &str,
        name: &str,
        updated_at: i64,
    ) -> Result<ExpectedArtist> {
        sqlx::query(
            r#"
            INSERT INTO expected_artists (artist_id, mbid, name, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(artist_id) DO UPDATE SET
                mbid = excluded.mbid,
                name = excluded.name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(artist_id)
        .bind(mbid)
        .bind(name)
        .bind(updated_at)
        .execute(pool)
        .await?;

        Self::by_artist_id(pool, artist_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("expected artist vanished after upsert"))
    }

    pub async fn by_artist_id(pool: &SqlitePool, artist_id: i64) -> Result<Option<ExpectedArtist>> {
        let row: Option<ExpectedArtistRow> =
            sqlx::query_as("SELECT * FROM expected_artists WHERE artist_id = ?")
                .bind(artist_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(ExpectedArtistRow::into_model))
    }

    pub async fn all(pool: &SqlitePool) -> Result<Vec<ExpectedArtist>> {
        let rows: Vec<ExpectedArtistRow> =
            sqlx::query_as("SELECT * FROM expected_artists ORDER BY name")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(ExpectedArtistRow::into_model).collect())
    }
}

#[derive(Debug, FromRow)]
struct ExpectedAlbumRow {
    id: i64,
    expected_artist_id: i64,
    mb_release_group_id: Option<String>,
    title: String,
    normalized_title: String,
    primary_type: Option<String>,
    secondary_types: String,
    year: Option<i64>,
    updated_at: i64,
}

impl ExpectedAlbumRow {
    fn into_model(self) -> ExpectedAlbum {
        let secondary_types: Vec<String> =
            serde_json::from_str(&self.secondary_types).unwrap_or_default();
        ExpectedAlbum {
            id: self.id,
            expected_artist_id: self.expected_artist_id,
            mb_release_group_id: self.mb_release_group_id,
            title: self.title,
            normalized_title: self.normalized_title,
            primary_type: self.primary_type,
            secondary_types,
            year: self.year,
            updated_at: self.updated_at,
        }
    }
}

/// One release to record as expected, already normalized by the caller.
#[derive(Debug, Clone)]
pub struct ExpectedAlbumUpsert {
    pub mb_release_group_id: Option<String>,
    pub title: String,
    pub normalized_title: String,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
    pub year: Option<i64>,
}

pub struct ExpectedAlbumTable;

impl ExpectedAlbumTable {
    /// Refresh the expected set for one artist in a single transaction:
    /// upsert every release (keyed by release-group id when present), then
    /// prune rows this sync did not touch.
    pub async fn replace_for_artist(
        pool: &SqlitePool,
        expected_artist_id: i64,
        releases: &[ExpectedAlbumUpsert],
        synced_at: i64,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;

        for release in releases {
            let secondary = serde_json::to_string(&release.secondary_types)?;
            if release.mb_release_group_id.is_some() {
                sqlx::query(
                    r#"
                    INSERT INTO expected_albums
                        (expected_artist_id, mb_release_group_id, title, normalized_title,
                         primary_type, secondary_types, year, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(expected_artist_id, mb_release_group_id)
                        WHERE mb_release_group_id IS NOT NULL
                    DO UPDATE SET
                        title = excluded.title,
                        normalized_title = excluded.normalized_title,
                        primary_type = excluded.primary_type,
                        secondary_types = excluded.secondary_types,
                        year = excluded.year,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(expected_artist_id)
                .bind(&release.mb_release_group_id)
                .bind(&release.title)
                .bind(&release.normalized_title)
                .bind(&release.primary_type)
                .bind(&secondary)
                .bind(release.year)
                .bind(synced_at)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO expected_albums
                        (expected_artist_id, mb_release_group_id, title, normalized_title,
                         primary_type, secondary_types, year, updated_at)
                    VALUES (?, NULL, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(expected_artist_id)
                .bind(&release.title)
                .bind(&release.normalized_title)
                .bind(&release.primary_type)
                .bind(&secondary)
                .bind(release.year)
                .bind(synced_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM expected_albums WHERE expected_artist_id = ? AND updated_at < ?")
            .bind(expected_artist_id)
            .bind(synced_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a single user-entered expectation outside a sync (the
    /// wishlist's manual path).
    pub async fn insert_manual(
        pool: &SqlitePool,
        expected_artist_id: i64,
        up: &ExpectedAlbumUpsert,
        now: i64,
    ) -> Result<i64> {
        let secondary = serde_json::to_string(&up.secondary_types)?;
        let result = sqlx::query(
            r#"
            INSERT INTO expected_albums
                (expected_artist_id, mb_release_group_id, title, normalized_title,
                 primary_type, secondary_types, year, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expected_artist_id)
        .bind(&up.mb_release_group_id)
        .bind(&up.title)
        .bind(&up.normalized_title)
        .bind(&up.primary_type)
        .bind(&secondary)
        .bind(up.year)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn by_id(pool: &SqlitePool, id: i64) -> Result<Option<ExpectedAlbum>> {
        let row: Option<ExpectedAlbumRow> =
            sqlx::query_as("SELECT * FROM expected_albums WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(ExpectedAlbumRow::into_model))
    }

    pub async fn by_expected_artist(
        pool: &SqlitePool,
        expected_artist_id: i64,
    ) -> Result<Vec<ExpectedAlbum>> {
        let rows: Vec<ExpectedAlbumRow> = sqlx::query_as(
            "SELECT * FROM expected_albums WHERE expected_artist_id = ? ORDER BY year, title",
        )
        .bind(expected_artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ExpectedAlbumRow::into_model).collect())
    }
}

pub struct ExpectedIgnoredTable;

impl ExpectedIgnoredTable {
    /// Idempotent: ignoring an already-ignored album is a no-op.
    pub async fn ignore(pool: &SqlitePool, artist_id: i64, expected_album_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO expected_ignored_albums (artist_id, expected_album_id) \
             VALUES (?, ?)",
        )
        .bind(artist_id)
        .bind(expected_album_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn unignore(pool: &SqlitePool, artist_id: i64, expected_album_id: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM expected_ignored_albums WHERE artist_id = ? AND expected_album_id = ?",
        )
        .bind(artist_id)
        .bind(expected_album_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn ids_for_artist(pool: &SqlitePool, artist_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT expected_album_id FROM expected_ignored_albums WHERE artist_id = ?",
        )
        .bind(artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

pub struct ExpectedSettingsTable;

impl ExpectedSettingsTable {
    /// Stored settings, or the conservative defaults when the user never
    /// touched them.
    pub async fn get(pool: &SqlitePool, artist_id: i64) -> Result<ExpectedArtistSettings> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT include_live, include_compilations FROM expected_artist_settings \
             WHERE artist_id = ?",
        )
        .bind(artist_id)
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            Some((live, comp)) => ExpectedArtistSettings {
                artist_id,
                include_live: live != 0,
                include_compilations: comp != 0,
            },
            None => ExpectedArtistSettings::defaults_for(artist_id),
        })
    }

    pub async fn upsert(pool: &SqlitePool, settings: &ExpectedArtistSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO expected_artist_settings (artist_id, include_live, include_compilations)
            VALUES (?, ?, ?)
            ON CONFLICT(artist_id) DO UPDATE SET
                include_live = excluded.include_live,
                include_compilations = excluded.include_compilations
            "#,
        )
        .bind(settings.artist_id)
        .bind(settings.include_live as i64)
        .bind(settings.include_compilations as i64)
        .execute(pool)
        .await?;
        Ok(())
    }
}
