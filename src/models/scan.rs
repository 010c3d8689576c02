//! Scan lifecycle models

use std::collections::HashMap;

use serde::Serialize;

/// Scanner state machine: `idle -> running -> idle | cancelled | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatusKind {
    Idle,
    Running,
    Cancelled,
    Error,
}

impl ScanStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatusKind::Idle => "idle",
            ScanStatusKind::Running => "running",
            ScanStatusKind::Cancelled => "cancelled",
            ScanStatusKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => ScanStatusKind::Running,
            "cancelled" => ScanStatusKind::Cancelled,
            "error" => ScanStatusKind::Error,
            _ => ScanStatusKind::Idle,
        }
    }
}

/// Point-in-time view of the current (or last) scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub status: ScanStatusKind,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub current_path: Option<String>,
    pub scanned_files: u64,
    pub skipped_files: u64,
    #[serde(rename = "skippedReasonsBreakdown")]
    pub skipped_reasons: HashMap<String, u64>,
    pub error: Option<String>,
}

impl ScanSnapshot {
    pub fn idle() -> Self {
        Self {
            status: ScanStatusKind::Idle,
            started_at: None,
            finished_at: None,
            current_path: None,
            scanned_files: 0,
            skipped_files: 0,
            skipped_reasons: HashMap::new(),
            error: None,
        }
    }
}

/// One skipped file, keyed by the scan that saw it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSkip {
    pub scan_started_at: i64,
    pub file_path: String,
    pub reason: String,
}
