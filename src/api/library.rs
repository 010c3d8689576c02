//! Library API routes

use actix_web::{get, put, web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::db::tables::{AlbumTable, ArtistTable};
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumsQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// `0` or `1`
    pub owned: Option<u8>,
}

#[get("/albums")]
pub async fn list_albums(
    state: web::Data<AppState>,
    query: web::Query<AlbumsQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::Validation("page starts at 1".to_string()));
    }
    let page_size = query.page_size.unwrap_or(50);
    if !(1..=100).contains(&page_size) {
        return Err(ApiError::Validation("pageSize must be between 1 and 100".to_string()));
    }
    let owned = match query.owned {
        None => None,
        Some(0) => Some(false),
        Some(1) => Some(true),
        Some(_) => return Err(ApiError::Validation("owned must be 0 or 1".to_string())),
    };

    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (albums, total) =
        AlbumTable::paginate(&state.pool, search, owned, page, page_size).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "albums": albums,
        "page": page,
        "pageSize": page_size,
        "total": total,
    })))
}

#[derive(Debug, Deserialize)]
pub struct OwnedBody {
    pub owned: bool,
}

#[put("/albums/{id}/owned")]
pub async fn set_album_owned(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<OwnedBody>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !AlbumTable::set_owned(&state.pool, id, body.owned).await? {
        return Err(ApiError::NotFound("album".to_string()));
    }
    let album = AlbumTable::by_id(&state.pool, id).await?;
    Ok(HttpResponse::Ok().json(album))
}

#[get("/artists")]
pub async fn list_artists(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let artists = ArtistTable::all_active(&state.pool).await?;
    Ok(HttpResponse::Ok().json(artists))
}

#[get("/artists/{id}")]
pub async fn get_artist(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let artist = ArtistTable::by_id(&state.pool, path.into_inner())
        .await?
        .filter(|a| !a.deleted)
        .ok_or_else(|| ApiError::NotFound("artist".to_string()))?;
    let albums = AlbumTable::active_by_artist(&state.pool, artist.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "artist": artist,
        "albums": albums,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_albums)
        .service(set_album_owned)
        .service(list_artists)
        .service(get_artist);
}
