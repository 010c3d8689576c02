//! Scan state and skip ledger operations

use std::collections::HashMap;

use anyhow::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::{ScanSkip, ScanSnapshot, ScanStatusKind};

#[derive(Debug, FromRow)]
struct ScanStateRow {
    status: String,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    current_path: Option<String>,
    scanned_files: i64,
    skipped_files: i64,
    skipped_reasons: String,
    error: Option<String>,
}

impl ScanStateRow {
    fn into_snapshot(self) -> ScanSnapshot {
        let skipped_reasons: HashMap<String, u64> =
            serde_json::from_str(&self.skipped_reasons).unwrap_or_default();
        ScanSnapshot {
            status: ScanStatusKind::parse(&self.status),
            started_at: self.started_at,
            finished_at: self.finished_at,
            current_path: self.current_path,
            scanned_files: self.scanned_files as u64,
            skipped_files: self.skipped_files as u64,
            skipped_reasons,
            error: self.error,
        }
    }
}

/// The singleton scan_state row (id = 1), mutated throughout a scan.
pub struct ScanStateTable;

impl ScanStateTable {
    pub async fn mark_running(pool: &SqlitePool, started_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scan_state SET
                status = 'running', started_at = ?, finished_at = NULL,
                current_path = NULL, scanned_files = 0, skipped_files = 0,
                skipped_reasons = '{}', error = NULL
            WHERE id = 1
            "#,
        )
        .bind(started_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Periodic progress checkpoint; keeps concurrent readers informed.
    pub async fn update_progress(
        pool: &SqlitePool,
        current_path: &str,
        scanned_files: u64,
        skipped_files: u64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE scan_state SET current_path = ?, scanned_files = ?, skipped_files = ? \
             WHERE id = 1",
        )
        .bind(current_path)
        .bind(scanned_files as i64)
        .bind(skipped_files as i64)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn finalize(
        pool: &SqlitePool,
        status: ScanStatusKind,
        scanned_files: u64,
        skipped_files: u64,
        skipped_reasons: &HashMap<String, u64>,
        finished_at: i64,
        error: Option<&str>,
    ) -> Result<()> {
        let reasons = serde_json::to_string(skipped_reasons)?;
        sqlx::query(
            r#"
            UPDATE scan_state SET
                status = ?, scanned_files = ?, skipped_files = ?,
                skipped_reasons = ?, finished_at = ?, current_path = NULL, error = ?
            WHERE id = 1
            "#,
        )
        .bind(status.as_str())
        .bind(scanned_files as i64)
        .bind(skipped_files as i64)
        .bind(&reasons)
        .bind(finished_at)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn snapshot(pool: &SqlitePool) -> Result<ScanSnapshot> {
        let row: ScanStateRow = sqlx::query_as("SELECT * FROM scan_state WHERE id = 1")
            .fetch_one(pool)
            .await?;
        Ok(row.into_snapshot())
    }
}

/// Per-file skip ledger for the current (or last) scan.
pub struct ScanSkippedTable;

impl ScanSkippedTable {
    /// Drop ledger rows from earlier scans.
    pub async fn clear_before(pool: &SqlitePool, scan_started_at: i64) -> Result<()> {
        sqlx::query("DELETE FROM scan_skipped WHERE scan_started_at < ?")
            .bind(scan_started_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn insert(
        pool: &SqlitePool,
        scan_started_at: i64,
        file_path: &str,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO scan_skipped (scan_started_at, file_path, reason) VALUES (?, ?, ?)",
        )
        .bind(scan_started_at)
        .bind(file_path)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list(pool: &SqlitePool, limit: u32) -> Result<Vec<ScanSkip>> {
        #[derive(FromRow)]
        struct Row {
            scan_started_at: i64,
            file_path: String,
            reason: String,
        }
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT scan_started_at, file_path, reason FROM scan_skipped \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ScanSkip {
                scan_started_at: r.scan_started_at,
                file_path: r.file_path,
                reason: r.reason,
            })
            .collect())
    }
}
