//! Album match override operations
//!
//! Overrides pin an expected album to an owned album 1:1. Setting an
//! override displaces any previous pin touching either side.

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::AlbumMatchOverride;

#[derive(Debug, FromRow)]
struct OverrideRow {
    id: i64,
    expected_album_id: i64,
    owned_album_id: i64,
}

impl OverrideRow {
    fn into_model(self) -> AlbumMatchOverride {
        AlbumMatchOverride {
            id: self.id,
            expected_album_id: self.expected_album_id,
            owned_album_id: self.owned_album_id,
        }
    }
}

pub struct OverrideTable;

impl OverrideTable {
    pub async fn set(pool: &SqlitePool, expected_album_id: i64, owned_album_id: i64) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "DELETE FROM album_match_overrides WHERE expected_album_id = ? OR owned_album_id = ?",
        )
        .bind(expected_album_id)
        .bind(owned_album_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO album_match_overrides (expected_album_id, owned_album_id) VALUES (?, ?)",
        )
        .bind(expected_album_id)
        .bind(owned_album_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove the pin for an expected album. False when none existed.
    pub async fn clear(pool: &SqlitePool, expected_album_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM album_match_overrides WHERE expected_album_id = ?")
            .bind(expected_album_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overrides touching one artist's expected albums.
    pub async fn for_expected_artist(
        pool: &SqlitePool,
        expected_artist_id: i64,
    ) -> Result<Vec<AlbumMatchOverride>> {
        let rows: Vec<OverrideRow> = sqlx::query_as(
            r#"
            SELECT o.id, o.expected_album_id, o.owned_album_id
            FROM album_match_overrides o
            JOIN expected_albums e ON e.id = o.expected_album_id
            WHERE e.expected_artist_id = ?
            "#,
        )
        .bind(expected_artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(OverrideRow::into_model).collect())
    }
}
