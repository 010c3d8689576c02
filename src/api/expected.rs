//! Expected-discography API routes

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::errors::ApiError;

/// Sync the expected release set from the metadata service. Upstream
/// failures come back as 502 with details for the caller's log.
#[post("/artist/{id}/sync")]
pub async fn sync_artist(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let summary = state.discography.sync_expected_for_artist(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/artist/{id}/summary")]
pub async fn artist_summary(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let summary = state.discography.compute_summary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreBody {
    pub expected_album_id: i64,
}

#[post("/artist/{id}/ignore")]
pub async fn ignore_album(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<IgnoreBody>,
) -> Result<HttpResponse, ApiError> {
    state.discography.ignore_expected_album(path.into_inner(), body.expected_album_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ignored": true })))
}

#[post("/artist/{id}/unignore")]
pub async fn unignore_album(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<IgnoreBody>,
) -> Result<HttpResponse, ApiError> {
    state.discography.unignore_expected_album(path.into_inner(), body.expected_album_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ignored": false })))
}

#[get("/artist/{id}/settings")]
pub async fn get_settings(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let settings = state.discography.artist_settings(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    pub include_live: Option<bool>,
    pub include_compilations: Option<bool>,
}

#[post("/artist/{id}/settings")]
pub async fn update_settings(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<SettingsBody>,
) -> Result<HttpResponse, ApiError> {
    let settings = state
        .discography
        .update_artist_settings(path.into_inner(), body.include_live, body.include_compilations)
        .await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
    pub expected_album_id: i64,
    pub owned_album_id: i64,
}

#[post("/artist/{id}/override")]
pub async fn set_override(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<OverrideBody>,
) -> Result<HttpResponse, ApiError> {
    state
        .discography
        .set_match_override(path.into_inner(), body.expected_album_id, body.owned_album_id)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "overridden": true })))
}

#[delete("/artist/{id}/override/{expectedAlbumId}")]
pub async fn clear_override(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (artist_id, expected_album_id) = path.into_inner();
    let removed = state.discography.clear_match_override(artist_id, expected_album_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(sync_artist)
        .service(artist_summary)
        .service(ignore_album)
        .service(unignore_album)
        .service(get_settings)
        .service(update_settings)
        .service(set_override)
        .service(clear_override);
}
