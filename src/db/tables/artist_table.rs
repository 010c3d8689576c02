//! Artist table operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::Artist;
use crate::utils::hashing::short_path_hash;

#[derive(Debug, FromRow)]
struct ArtistRow {
    id: i64,
    name: String,
    slug: String,
    deleted: i64,
    last_seen_at: i64,
    created_at: i64,
}

impl ArtistRow {
    fn into_artist(self) -> Artist {
        Artist {
            id: self.id,
            name: self.name,
            slug: self.slug,
            deleted: self.deleted != 0,
            last_seen_at: self.last_seen_at,
            created_at: self.created_at,
        }
    }
}

pub struct ArtistTable;

impl ArtistTable {
    /// Mark an artist as seen by the current scan, creating the row on
    /// first sight. An existing row keeps its slug; a fresh row gets the
    /// proposed slug, disambiguated when another artist already claims it.
    pub async fn upsert_seen(
        pool: &SqlitePool,
        name: &str,
        slug: &str,
        seen_at: i64,
    ) -> Result<Artist> {
        if let Some(existing) = Self::by_name(pool, name).await? {
            sqlx::query("UPDATE artists SET deleted = 0, last_seen_at = ? WHERE id = ?")
                .bind(seen_at)
                .bind(existing.id)
                .execute(pool)
                .await?;
            return Ok(Artist { deleted: false, last_seen_at: seen_at, ..existing });
        }

        let slug = if slug.is_empty() || Self::by_slug(pool, slug).await?.is_some() {
            format!("{slug}-{}", short_path_hash(name))
        } else {
            slug.to_string()
        };

        sqlx::query(
            "INSERT INTO artists (name, slug, deleted, last_seen_at, created_at) \
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(name)
        .bind(&slug)
        .bind(seen_at)
        .bind(seen_at)
        .execute(pool)
        .await?;

        Self::by_name(pool, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("artist row vanished after insert"))
    }

    pub async fn by_id(pool: &SqlitePool, id: i64) -> Result<Option<Artist>> {
        let row: Option<ArtistRow> = sqlx::query_as("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(ArtistRow::into_artist))
    }

    pub async fn by_name(pool: &SqlitePool, name: &str) -> Result<Option<Artist>> {
        let row: Option<ArtistRow> = sqlx::query_as("SELECT * FROM artists WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(ArtistRow::into_artist))
    }

    pub async fn by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Artist>> {
        let row: Option<ArtistRow> = sqlx::query_as("SELECT * FROM artists WHERE slug = ?")
            .bind(slug)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(ArtistRow::into_artist))
    }

    /// All live artists in ascending name order.
    pub async fn all_active(pool: &SqlitePool) -> Result<Vec<Artist>> {
        let rows: Vec<ArtistRow> =
            sqlx::query_as("SELECT * FROM artists WHERE deleted = 0 ORDER BY name")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(ArtistRow::into_artist).collect())
    }

    /// Soft-delete artists the finished scan no longer saw.
    pub async fn sweep(pool: &SqlitePool, scan_started_at: i64) -> Result<u64> {
        let result =
            sqlx::query("UPDATE artists SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?")
                .bind(scan_started_at)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_active(pool: &SqlitePool) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artists WHERE deleted = 0")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
