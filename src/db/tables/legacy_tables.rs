//! Legacy wanted-albums and alias operations
//!
//! These predate the metadata-driven expected path and survive only for the
//! artist overview surface and the manual wishlist form. The `expected_*`
//! tables are canonical.

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::{AlbumAlias, WantedAlbum};

#[derive(Debug, FromRow)]
struct WantedRow {
    id: i64,
    artist_id: i64,
    title: String,
    year: Option<i64>,
    source: String,
}

impl WantedRow {
    fn into_model(self) -> WantedAlbum {
        WantedAlbum {
            id: self.id,
            artist_id: self.artist_id,
            title: self.title,
            year: self.year,
            source: self.source,
        }
    }
}

pub struct WantedAlbumTable;

impl WantedAlbumTable {
    /// Case-insensitive find-or-create keeps the manual wishlist form
    /// idempotent.
    pub async fn find_or_create(
        pool: &SqlitePool,
        artist_id: i64,
        title: &str,
        year: Option<i64>,
        source: &str,
    ) -> Result<WantedAlbum> {
        let existing: Option<WantedRow> = sqlx::query_as(
            "SELECT * FROM wanted_albums WHERE artist_id = ? AND title = ? COLLATE NOCASE",
        )
        .bind(artist_id)
        .bind(title)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = existing {
            return Ok(row.into_model());
        }

        let result =
            sqlx::query("INSERT INTO wanted_albums (artist_id, title, year, source) VALUES (?, ?, ?, ?)")
                .bind(artist_id)
                .bind(title)
                .bind(year)
                .bind(source)
                .execute(pool)
                .await?;

        Ok(WantedAlbum {
            id: result.last_insert_rowid(),
            artist_id,
            title: title.to_string(),
            year,
            source: source.to_string(),
        })
    }

    pub async fn by_artist(pool: &SqlitePool, artist_id: i64) -> Result<Vec<WantedAlbum>> {
        let rows: Vec<WantedRow> =
            sqlx::query_as("SELECT * FROM wanted_albums WHERE artist_id = ? ORDER BY title")
                .bind(artist_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(WantedRow::into_model).collect())
    }
}

#[derive(Debug, FromRow)]
struct AliasRow {
    id: i64,
    album_id: i64,
    alias: String,
}

pub struct AlbumAliasTable;

impl AlbumAliasTable {
    pub async fn add(pool: &SqlitePool, album_id: i64, alias: &str) -> Result<()> {
        sqlx::query("INSERT INTO album_aliases (album_id, alias) VALUES (?, ?)")
            .bind(album_id)
            .bind(alias)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Aliases attached to any of one artist's owned albums.
    pub async fn for_artist(pool: &SqlitePool, artist_id: i64) -> Result<Vec<AlbumAlias>> {
        let rows: Vec<AliasRow> = sqlx::query_as(
            r#"
            SELECT al.id, al.album_id, al.alias
            FROM album_aliases al
            JOIN albums a ON a.id = al.album_id
            WHERE a.artist_id = ?
            "#,
        )
        .bind(artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| AlbumAlias { id: r.id, album_id: r.album_id, alias: r.alias })
            .collect())
    }
}
