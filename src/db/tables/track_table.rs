//! Track table operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::Track;

#[derive(Debug, FromRow)]
struct TrackRow {
    id: i64,
    path: String,
    album_id: i64,
    ext: String,
    mtime: i64,
    deleted: i64,
    last_seen_at: i64,
}

impl TrackRow {
    fn into_track(self) -> Track {
        Track {
            id: self.id,
            path: self.path,
            album_id: self.album_id,
            ext: self.ext,
            mtime: self.mtime,
            deleted: self.deleted != 0,
            last_seen_at: self.last_seen_at,
        }
    }
}

#[derive(Debug)]
pub struct TrackUpsert {
    pub path: String,
    pub album_id: i64,
    pub ext: String,
    pub mtime: i64,
    pub seen_at: i64,
}

pub struct TrackTable;

impl TrackTable {
    pub async fn upsert(pool: &SqlitePool, up: &TrackUpsert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracks (path, album_id, ext, mtime, deleted, last_seen_at)
            VALUES (?, ?, ?, ?, 0, ?)
            ON CONFLICT(path) DO UPDATE SET
                album_id = excluded.album_id,
                ext = excluded.ext,
                mtime = excluded.mtime,
                deleted = 0,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(&up.path)
        .bind(up.album_id)
        .bind(&up.ext)
        .bind(up.mtime)
        .bind(up.seen_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn active_by_album(pool: &SqlitePool, album_id: i64) -> Result<Vec<Track>> {
        let rows: Vec<TrackRow> = sqlx::query_as(
            "SELECT * FROM tracks WHERE album_id = ? AND deleted = 0 ORDER BY path",
        )
        .bind(album_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(TrackRow::into_track).collect())
    }

    pub async fn sweep(pool: &SqlitePool, scan_started_at: i64) -> Result<u64> {
        let result =
            sqlx::query("UPDATE tracks SET deleted = 1 WHERE deleted = 0 AND last_seen_at < ?")
                .bind(scan_started_at)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_active(pool: &SqlitePool) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks WHERE deleted = 0")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::connect_memory;
    use crate::db::tables::{AlbumTable, AlbumUpsert, ArtistTable};

    async fn seed_album(pool: &SqlitePool) -> i64 {
        let artist = ArtistTable::upsert_seen(pool, "A", "a", 100).await.unwrap();
        AlbumTable::upsert(
            pool,
            &AlbumUpsert {
                path: "/m/a/.crate/x-1".into(),
                artist_id: artist.id,
                title: "X".into(),
                formats: vec!["mp3".into()],
                track_count: 1,
                last_file_mtime: 100,
                seen_at: 100,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_path() {
        let pool = connect_memory().await.unwrap();
        let album_id = seed_album(&pool).await;

        let up = TrackUpsert {
            path: "/m/a/x/01.mp3".into(),
            album_id,
            ext: "mp3".into(),
            mtime: 100,
            seen_at: 100,
        };
        TrackTable::upsert(&pool, &up).await.unwrap();
        TrackTable::upsert(&pool, &TrackUpsert { mtime: 200, seen_at: 200, ..up }).await.unwrap();

        let tracks = TrackTable::active_by_album(&pool, album_id).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].mtime, 200);
    }

    #[tokio::test]
    async fn sweep_marks_unseen_tracks() {
        let pool = connect_memory().await.unwrap();
        let album_id = seed_album(&pool).await;

        for (path, seen) in [("/m/a/x/01.mp3", 100), ("/m/a/x/02.mp3", 200)] {
            TrackTable::upsert(
                &pool,
                &TrackUpsert {
                    path: path.into(),
                    album_id,
                    ext: "mp3".into(),
                    mtime: seen,
                    seen_at: seen,
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(TrackTable::sweep(&pool, 150).await.unwrap(), 1);
        assert_eq!(TrackTable::count_active(&pool).await.unwrap(), 1);
    }
}
