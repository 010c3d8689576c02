//! Wishlist table operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::WishlistAlbum;

#[derive(Debug, FromRow)]
struct WishlistRow {
    id: i64,
    expected_album_id: i64,
    status: String,
    created_at: i64,
}

impl WishlistRow {
    fn into_model(self) -> WishlistAlbum {
        WishlistAlbum {
            id: self.id,
            expected_album_id: self.expected_album_id,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

pub struct WishlistTable;

impl WishlistTable {
    /// Idempotent: re-wishing an album keeps the original entry.
    pub async fn add(pool: &SqlitePool, expected_album_id: i64, now: i64) -> Result<WishlistAlbum> {
        sqlx::query(
            "INSERT OR IGNORE INTO wishlist_albums (expected_album_id, status, created_at) \
             VALUES (?, 'wanted', ?)",
        )
        .bind(expected_album_id)
        .bind(now)
        .execute(pool)
        .await?;

        let row: WishlistRow =
            sqlx::query_as("SELECT * FROM wishlist_albums WHERE expected_album_id = ?")
                .bind(expected_album_id)
                .fetch_one(pool)
                .await?;
        Ok(row.into_model())
    }

    /// Remove an entry; false when nothing was wishlisted.
    pub async fn remove(pool: &SqlitePool, expected_album_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wishlist_albums WHERE expected_album_id = ?")
            .bind(expected_album_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn all(pool: &SqlitePool) -> Result<Vec<WishlistAlbum>> {
        let rows: Vec<WishlistRow> =
            sqlx::query_as("SELECT * FROM wishlist_albums ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(WishlistRow::into_model).collect())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wishlist_albums")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
