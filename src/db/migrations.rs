//! Database migrations
//!
//! Forward-only and additive: each step checks the information schema via
//! `pragma_table_info` before issuing `ALTER TABLE ... ADD COLUMN` with a
//! default, so fresh databases (whose baseline DDL already has the column)
//! and upgraded databases converge on the same shape.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Current migration version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let row: (i32,) = sqlx::query_as("SELECT version FROM dbmigration WHERE id = 1")
        .fetch_one(pool)
        .await?;
    let current_version = row.0;

    if current_version >= CURRENT_VERSION {
        info!("Database is up to date (version {})", current_version);
        return Ok(());
    }

    info!(
        "Running migrations from version {} to {}",
        current_version, CURRENT_VERSION
    );

    for version in (current_version + 1)..=CURRENT_VERSION {
        run_migration(pool, version).await?;

        sqlx::query("UPDATE dbmigration SET version = ? WHERE id = 1")
            .bind(version)
            .execute(pool)
            .await?;

        info!("Applied migration {}", version);
    }

    Ok(())
}

async fn run_migration(pool: &SqlitePool, version: i32) -> Result<()> {
    match version {
        1 => {
            // Baseline: tables are created by engine::connect.
        }
        2 => {
            // `owned` arrived after the initial albums table shipped
            add_column_if_missing(pool, "albums", "owned", "INTEGER NOT NULL DEFAULT 1").await?;
        }
        3 => {
            add_column_if_missing(
                pool,
                "wishlist_albums",
                "status",
                "TEXT NOT NULL DEFAULT 'wanted'",
            )
            .await?;
            add_column_if_missing(pool, "wanted_albums", "source", "TEXT NOT NULL DEFAULT 'manual'")
                .await?;
        }
        _ => {
            tracing::warn!("Unknown migration version: {}", version);
        }
    }

    Ok(())
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<()> {
    let present: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?"
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    if present == 0 {
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Get the current migration version.
pub async fn get_migration_version(pool: &SqlitePool) -> Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT version FROM dbmigration WHERE id = 1")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
