//! Artist API routes, including the legacy overview surface.

use std::collections::HashMap;

use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::api::AppState;
use crate::db::tables::{AlbumAliasTable, AlbumTable, ArtistTable, WantedAlbumTable};
use crate::errors::ApiError;
use crate::models::WantedAlbum;
use crate::utils::normalize::normalize_title;

#[get("/by-slug/{slug}")]
pub async fn artist_by_slug(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let artist = ArtistTable::by_slug(&state.pool, &path.into_inner())
        .await?
        .filter(|a| !a.deleted)
        .ok_or_else(|| ApiError::NotFound("artist".to_string()))?;
    Ok(HttpResponse::Ok().json(artist))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WantedEntry {
    #[serde(flatten)]
    wanted: WantedAlbum,
    matched: bool,
    owned_album_id: Option<i64>,
}

/// Legacy owned/wanted/missing view built on user-entered wanted albums
/// and album aliases. The metadata-driven expected path is canonical;
/// this endpoint survives for the older UI surface.
#[get("/{id}/overview")]
pub async fn artist_overview(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let artist = ArtistTable::by_id(&state.pool, path.into_inner())
        .await?
        .filter(|a| !a.deleted)
        .ok_or_else(|| ApiError::NotFound("artist".to_string()))?;

    let owned = AlbumTable::owned_active_by_artist(&state.pool, artist.id).await?;
    let aliases = AlbumAliasTable::for_artist(&state.pool, artist.id).await?;
    let wanted = WantedAlbumTable::by_artist(&state.pool, artist.id).await?;

    // titles and aliases share one normalized lookup
    let mut owned_by_title: HashMap<String, i64> = HashMap::new();
    for album in &owned {
        owned_by_title.insert(normalize_title(&album.title), album.id);
    }
    for alias in &aliases {
        owned_by_title.entry(normalize_title(&alias.alias)).or_insert(alias.album_id);
    }

    let entries: Vec<WantedEntry> = wanted
        .into_iter()
        .map(|w| {
            let owned_album_id = owned_by_title.get(&normalize_title(&w.title)).copied();
            WantedEntry { matched: owned_album_id.is_some(), owned_album_id, wanted: w }
        })
        .collect();

    let missing: Vec<&WantedEntry> = entries.iter().filter(|e| !e.matched).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "artist": artist,
        "ownedAlbums": owned,
        "wantedAlbums": entries,
        "missingAlbums": missing,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(artist_by_slug).service(artist_overview);
}
