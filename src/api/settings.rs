//! Settings API routes

use actix_web::{get, put, web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::db::tables::SettingsTable;
use crate::errors::ApiError;

#[get("")]
pub async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let settings = SettingsTable::get_or_init(&state.pool, &state.default_music_path).await?;
    Ok(HttpResponse::Ok().json(settings))
}

/// Partial update; unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsBody {
    pub music_path: Option<String>,
}

#[put("")]
pub async fn update_settings(
    state: web::Data<AppState>,
    body: web::Json<UpdateSettingsBody>,
) -> Result<HttpResponse, ApiError> {
    SettingsTable::get_or_init(&state.pool, &state.default_music_path).await?;

    if let Some(music_path) = body.music_path.as_deref().map(str::trim) {
        if music_path.is_empty() {
            return Err(ApiError::Validation("musicPath must not be empty".to_string()));
        }
        if !std::path::Path::new(music_path).is_dir() {
            return Err(ApiError::Validation(format!(
                "musicPath {music_path} is not a readable directory"
            )));
        }
        SettingsTable::set_music_path(&state.pool, music_path).await?;
    }

    let settings = SettingsTable::get_or_init(&state.pool, &state.default_music_path).await?;
    Ok(HttpResponse::Ok().json(settings))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_settings).service(update_settings);
}
