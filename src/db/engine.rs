//! Database connection management

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Open (creating if missing) the embedded store and ensure the schema
/// exists. The pool is cheap to clone and is injected wherever queries run.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .pragma("cache_size", "10000")
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// In-memory store for tests. Single connection: every handle must see the
/// same database.
#[cfg(test)]
pub async fn connect_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_tables(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes. Every statement is idempotent; schema
/// evolution beyond this baseline happens in `migrations`.
async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            music_path TEXT NOT NULL,
            server_id TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            deleted INTEGER NOT NULL DEFAULT 0,
            last_seen_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_artists_deleted ON artists(deleted);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            artist_id INTEGER NOT NULL REFERENCES artists(id),
            title TEXT NOT NULL,
            formats TEXT NOT NULL DEFAULT '[]',
            track_count INTEGER NOT NULL DEFAULT 0,
            last_file_mtime INTEGER NOT NULL DEFAULT 0,
            owned INTEGER NOT NULL DEFAULT 1,
            deleted INTEGER NOT NULL DEFAULT 0,
            last_seen_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);
        CREATE INDEX IF NOT EXISTS idx_albums_deleted ON albums(deleted);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            album_id INTEGER NOT NULL REFERENCES albums(id),
            ext TEXT NOT NULL,
            mtime INTEGER NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            last_seen_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_index (
            path TEXT PRIMARY KEY,
            mtime INTEGER NOT NULL,
            size INTEGER NOT NULL,
            inode_key TEXT,
            file_hash TEXT,
            tag_album TEXT,
            tag_album_artist TEXT,
            tag_artist TEXT,
            tag_year TEXT,
            tag_title TEXT,
            last_scan_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_file_index_scan ON file_index(last_scan_at);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_skipped (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scan_started_at INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            reason TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_scan_skipped_started ON scan_skipped(scan_started_at);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL DEFAULT 'idle',
            started_at INTEGER,
            finished_at INTEGER,
            current_path TEXT,
            scanned_files INTEGER NOT NULL DEFAULT 0,
            skipped_files INTEGER NOT NULL DEFAULT 0,
            skipped_reasons TEXT NOT NULL DEFAULT '{}',
            error TEXT
        );
        INSERT OR IGNORE INTO scan_state (id, status) VALUES (1, 'idle');
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expected_artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id INTEGER NOT NULL UNIQUE REFERENCES artists(id),
            mbid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expected_albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expected_artist_id INTEGER NOT NULL REFERENCES expected_artists(id),
            mb_release_group_id TEXT,
            title TEXT NOT NULL,
            normalized_title TEXT NOT NULL,
            primary_type TEXT,
            secondary_types TEXT NOT NULL DEFAULT '[]',
            year INTEGER,
            updated_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_expected_albums_rgid
            ON expected_albums(expected_artist_id, mb_release_group_id)
            WHERE mb_release_group_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_expected_albums_artist
            ON expected_albums(expected_artist_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expected_ignored_albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id INTEGER NOT NULL,
            expected_album_id INTEGER NOT NULL,
            UNIQUE (artist_id, expected_album_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expected_artist_settings (
            artist_id INTEGER PRIMARY KEY,
            include_live INTEGER NOT NULL DEFAULT 0,
            include_compilations INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album_match_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expected_album_id INTEGER NOT NULL UNIQUE,
            owned_album_id INTEGER NOT NULL UNIQUE
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wishlist_albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expected_album_id INTEGER NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'wanted',
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wanted_albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            year INTEGER,
            source TEXT NOT NULL DEFAULT 'manual'
        );
        CREATE INDEX IF NOT EXISTS idx_wanted_albums_artist ON wanted_albums(artist_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album_aliases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            album_id INTEGER NOT NULL,
            alias TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_album_aliases_album ON album_aliases(album_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dbmigration (
            id INTEGER PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0
        );
        INSERT OR IGNORE INTO dbmigration (id, version) VALUES (1, 0);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
