//! Album table operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::Album;

#[derive(Debug, FromRow)]
struct AlbumRow {
    id: i64,
    path: String,
    artist_id: i64,
    title: String,
    formats: String,
    track_count: i64,
    last_file_mtime: i64,
    owned: i64,
    deleted: i64,
    last_seen_at: i64,
    created_at: i64,
}

impl AlbumRow {
    fn into_album(self) -> Album {
        let formats: Vec<String> = serde_json::from_str(&self.formats).unwrap_or_default();
        Album {
            id: self.id,
            path: self.path,
            artist_id: self.artist_id,
            title: self.title,
            formats,
            track_count: self.track_count,
            last_file_mtime: self.last_file_mtime,
            owned: self.owned != 0,
            deleted: self.deleted != 0,
            last_seen_at: self.last_seen_at,
            created_at: self.created_at,
        }
    }
}

/// Scan-produced album state. `owned` is deliberately absent: it is user
/// state and upserts never touch it.
#[derive(Debug)]
pub struct AlbumUpsert {
    pub path: String,
    pub artist_id: i64,
    pub title: String,
    pub formats: Vec<String>,
    pub track_count: i64,
    pub last_file_mtime: i64,
    pub seen_at: i64,
}

pub struct AlbumTable;

impl AlbumTable {
    /// Upsert by virtual path, reviving a soft-deleted row and preserving
    /// the user's `owned` flag. Returns the album id.
    pub async fn upsert(pool: &SqlitePool, up: &AlbumUpsert) -> Result<i64> {
        let formats = serde_json::to_string(&up.formats)?;

        sqlx::query(
            r#"
            INSERT INTO albums
                (path, artist_id, title, formats, track_count, last_file_mtime,
                 owned, deleted, last_seen_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                artist_id = excluded.artist_id,
                title = excluded.title,
                formats = excluded.formats,
                track_count = excluded.track_count,
                last_file_mtime = excluded.last_file_mtime,
                deleted = 0,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(&up.path)
        .bind(up.artist_id)
        .bind(&up.title)
        .bind(&formats)
        .bind(up.track_count)
        .bind(up.last_file_mtime)
        .bind(up.seen_at)
        .bind(up.seen_at)
        .execute(pool)
        .await?;

        let row: (i64,) = sqlx::query_as("SELECT id FROM albums WHERE path = ?")
            .bind(&up.path)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn by_id(pool: &SqlitePool, id: i64) -> Result<Option<Album>> {
        let row: Option<AlbumRow> = sqlx::query_as("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(AlbumRow::into_album))
    }

    /// Live albums for one artist.
    pub async fn active_by_artist(pool: &SqlitePool, artist_id: i64) -> Result<Vec<Album>> {
        let rows: Vec<AlbumRow> = sqlx::query_as(
            "SELECT * FROM albums WHERE artist_id = ? AND deleted = 0 ORDER BY title",
        )
        .bind(artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(AlbumRow::into_album).collect())
    }

    /// Live albums the user actually owns, the input set for summaries.
    pub async fn owned_active_by_artist(pool: &SqlitePool, artist_id: i64) -> Result<Vec<Album>> {
        let rows: Vec<AlbumRow> = sqlx::query_as(
            "SELECT * FROM albums WHERE artist_id = ? AND deleted = 0 AND owned = 1 \
             ORDER BY title",
        )
        .bind(artist_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(AlbumRow::into_album).collect())
    }

    /// Paginated live albums with optional title search and owned filter.
    /// Returns the page plus the total row count for that filter.
    pub async fn paginate(
        pool: &SqlitePool,
        search: Option<&str>,
        owned: Option<bool>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Album>, i64)> {
        let mut conditions = vec!["deleted = 0".to_string()];
        if search.is_some() {
            conditions.push("title LIKE '%' || ? || '%'".to_string());
        }
        if owned.is_some() {
            conditions.push("owned = ?".to_string());
        }
        let where_clause = conditions.join(" AND ");

        let count_sql = format!("SELECT COUNT(*) FROM albums WHERE {where_clause}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        if let Some(s) = search {
            count_query = count_query.bind(s.to_string());
        }
        if let Some(o) = owned {
            count_query = count_query.bind(o as i64);
        }
        let (total,) = count_query.fetch_one(pool).await?;

        let offset = (page.saturating_sub(1) as i64) * page_size as i64;
        let page_sql = format!(
            "SELECT * FROM albums WHERE {where_clause} ORDER BY title LIMIT ? OFFSET ?"
        );
        let mut page_query = sqlx::query_as::<_, AlbumRow>(&page_sql);
        if let Some(s) = search {
            page_query = page_query.bind(s.to_string());
        }
        if let Some(o) = owned {
            page_query = page_query.bind(o as i64);
        }
        let rows = page_query
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok((rows.into_iter().map(AlbumRow::into_album).collect(), total))
    }

    /// Flip the user's owned flag. False when the album does not exist.
    pub async fn set_owned(pool: &SqlitePool, id: i64, owned: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE albums SET owned = ? WHERE id = ? AND deleted = 0")
            .bind(owned as i64)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn sweep(pool: &SqlitePool, scan_started_at: i64) -> Result<u64> {
        let result =
            sqlx::query("UPDATE albums SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?")
                .bind(scan_started_at)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_active(pool: &SqlitePool) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM albums WHERE deleted = 0")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Most recently created live albums, for the dashboard.
    pub async fn recent(pool: &SqlitePool, limit: u32) -> Result<Vec<Album>> {
        let rows: Vec<AlbumRow> = sqlx::query_as(
            "SELECT * FROM albums WHERE deleted = 0 ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(AlbumRow::into_album).collect())
    }
}
