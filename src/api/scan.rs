//! Scan API routes

use std::path::PathBuf;

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::core::scanner::ScanOptions;
use crate::db::tables::{ArtistTable, ScanSkippedTable, SettingsTable};
use crate::errors::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScanBody {
    pub recursive: Option<bool>,
    pub max_depth: Option<u32>,
    pub artist_id: Option<i64>,
}

/// Kick off a scan. A 200 with `started: false` means one is already in
/// flight.
#[post("/start")]
pub async fn start_scan(
    state: web::Data<AppState>,
    body: Option<web::Json<StartScanBody>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    let max_depth = body.max_depth.unwrap_or(3);
    if !(1..=20).contains(&max_depth) {
        return Err(ApiError::Validation("maxDepth must be between 1 and 20".to_string()));
    }

    if let Some(artist_id) = body.artist_id {
        ArtistTable::by_id(&state.pool, artist_id)
            .await?
            .filter(|a| !a.deleted)
            .ok_or_else(|| ApiError::NotFound("artist".to_string()))?;
    }

    let settings = SettingsTable::get_or_init(&state.pool, &state.default_music_path).await?;
    let outcome = state.scanner.start_scan(
        PathBuf::from(settings.music_path),
        ScanOptions {
            recursive: body.recursive.unwrap_or(true),
            max_depth,
            artist_id: body.artist_id,
        },
    );

    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/cancel")]
pub async fn cancel_scan(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.scanner.request_cancel()))
}

#[get("/status")]
pub async fn scan_status(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(state.scanner.status()))
}

#[derive(Debug, Deserialize)]
pub struct SkippedQuery {
    pub limit: Option<u32>,
}

/// Skip ledger rows for the current or most recent scan.
#[get("/skipped")]
pub async fn scan_skipped(
    state: web::Data<AppState>,
    query: web::Query<SkippedQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(ApiError::Validation("limit must be between 1 and 1000".to_string()));
    }

    let rows = ScanSkippedTable::list(&state.pool, limit).await?;
    Ok(HttpResponse::Ok().json(rows))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(start_scan)
        .service(cancel_scan)
        .service(scan_status)
        .service(scan_skipped);
}
