//! Settings singleton operations

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::Settings;
use crate::utils::now_millis;

#[derive(Debug, FromRow)]
struct SettingsRow {
    music_path: String,
    server_id: String,
    updated_at: i64,
}

pub struct SettingsTable;

impl SettingsTable {
    /// Fetch the singleton row, seeding it with the environment default on
    /// first run.
    pub async fn get_or_init(pool: &SqlitePool, default_music_path: &str) -> Result<Settings> {
        sqlx::query(
            "INSERT OR IGNORE INTO settings (id, music_path, server_id, updated_at) \
             VALUES (1, ?, ?, ?)",
        )
        .bind(default_music_path)
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(now_millis())
        .execute(pool)
        .await?;

        let row: SettingsRow = sqlx::query_as(
            "SELECT music_path, server_id, updated_at FROM settings WHERE id = 1",
        )
        .fetch_one(pool)
        .await?;

        Ok(Settings {
            music_path: row.music_path,
            server_id: row.server_id,
            updated_at: row.updated_at,
        })
    }

    pub async fn set_music_path(pool: &SqlitePool, music_path: &str) -> Result<()> {
        sqlx::query("UPDATE settings SET music_path = ?, updated_at = ? WHERE id = 1")
            .bind(music_path)
            .bind(now_millis())
            .execute(pool)
            .await?;
        Ok(())
    }
}
