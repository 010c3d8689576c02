//! Wishlist API routes

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::db::tables::{ArtistTable, ExpectedAlbumTable, WantedAlbumTable, WishlistTable};
use crate::errors::ApiError;
use crate::utils::now_millis;

/// Either an `expectedAlbumId` (metadata-driven path) or an
/// `artistId`+`title` pair (legacy manual path).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistBody {
    pub expected_album_id: Option<i64>,
    pub artist_id: Option<i64>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub source: Option<String>,
}

#[post("")]
pub async fn add_to_wishlist(
    state: web::Data<AppState>,
    body: web::Json<WishlistBody>,
) -> Result<HttpResponse, ApiError> {
    if let Some(expected_album_id) = body.expected_album_id {
        ExpectedAlbumTable::by_id(&state.pool, expected_album_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("expected album".to_string()))?;

        let entry = WishlistTable::add(&state.pool, expected_album_id, now_millis()).await?;
        return Ok(HttpResponse::Ok().json(entry));
    }

    if let (Some(artist_id), Some(title)) = (body.artist_id, body.title.as_deref()) {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::Validation("title must not be empty".to_string()));
        }
        ArtistTable::by_id(&state.pool, artist_id)
            .await?
            .filter(|a| !a.deleted)
            .ok_or_else(|| ApiError::NotFound("artist".to_string()))?;

        let source = body.source.as_deref().unwrap_or("manual");
        let wanted =
            WantedAlbumTable::find_or_create(&state.pool, artist_id, title, body.year, source)
                .await?;
        return Ok(HttpResponse::Ok().json(wanted));
    }

    Err(ApiError::Validation(
        "provide either expectedAlbumId or artistId with title".to_string(),
    ))
}

#[get("")]
pub async fn list_wishlist(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let entries = WishlistTable::all(&state.pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[delete("/{expectedAlbumId}")]
pub async fn remove_from_wishlist(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let removed = WishlistTable::remove(&state.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_to_wishlist).service(list_wishlist).service(remove_from_wishlist);
}
