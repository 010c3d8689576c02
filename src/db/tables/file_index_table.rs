//! File index table operations
//!
//! The file index caches tag extraction and filesystem identity per path so
//! unchanged files (same mtime and size) skip re-parse on later scans. Rows
//! untouched by a completed full scan are pruned.

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

/// One cached file. `path` is the canonical absolute path handed to the tag
/// reader.
#[derive(Debug, Clone, FromRow)]
pub struct FileIndexEntry {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub inode_key: Option<String>,
    pub file_hash: Option<String>,
    pub tag_album: Option<String>,
    pub tag_album_artist: Option<String>,
    pub tag_artist: Option<String>,
    pub tag_year: Option<String>,
    pub tag_title: Option<String>,
    pub last_scan_at: i64,
}

pub struct FileIndexTable;

impl FileIndexTable {
    pub async fn get(pool: &SqlitePool, path: &str) -> Result<Option<FileIndexEntry>> {
        let row: Option<FileIndexEntry> =
            sqlx::query_as("SELECT * FROM file_index WHERE path = ?")
                .bind(path)
                .fetch_optional(pool)
                .await?;
        Ok(row)
    }

    pub async fn upsert(pool: &SqlitePool, entry: &FileIndexEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_index
                (path, mtime, size, inode_key, file_hash,
                 tag_album, tag_album_artist, tag_artist, tag_year, tag_title,
                 last_scan_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                mtime = excluded.mtime,
                size = excluded.size,
                inode_key = excluded.inode_key,
                file_hash = excluded.file_hash,
                tag_album = excluded.tag_album,
                tag_album_artist = excluded.tag_album_artist,
                tag_artist = excluded.tag_artist,
                tag_year = excluded.tag_year,
                tag_title = excluded.tag_title,
                last_scan_at = excluded.last_scan_at
            "#,
        )
        .bind(&entry.path)
        .bind(entry.mtime)
        .bind(entry.size)
        .bind(&entry.inode_key)
        .bind(&entry.file_hash)
        .bind(&entry.tag_album)
        .bind(&entry.tag_album_artist)
        .bind(&entry.tag_artist)
        .bind(&entry.tag_year)
        .bind(&entry.tag_title)
        .bind(entry.last_scan_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a cache hit as seen by the current scan.
    pub async fn touch(pool: &SqlitePool, path: &str, last_scan_at: i64) -> Result<()> {
        sqlx::query("UPDATE file_index SET last_scan_at = ? WHERE path = ?")
            .bind(last_scan_at)
            .bind(path)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Drop rows the finished full scan did not touch.
    pub async fn prune(pool: &SqlitePool, scan_started_at: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM file_index WHERE last_scan_at < ?")
            .bind(scan_started_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_index")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
