//! Liveness, stats, and dashboard routes

use actix_web::{get, web, HttpResponse};
use tracing::debug;

use crate::api::AppState;
use crate::db::tables::{
    AlbumTable, ArtistTable, ExpectedArtistTable, ScanStateTable, TrackTable, WishlistTable,
};
use crate::errors::ApiError;

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "gitSha": state.git_sha,
        "features": {
            "scanner": true,
            "metadata": true,
            "wishlist": true,
        },
    }))
}

#[get("/stats")]
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(library_stats(&state).await?))
}

async fn library_stats(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let artists = ArtistTable::count_active(&state.pool).await?;
    let albums = AlbumTable::count_active(&state.pool).await?;
    let tracks = TrackTable::count_active(&state.pool).await?;
    let last_scan_at = ScanStateTable::snapshot(&state.pool).await?.finished_at;

    Ok(serde_json::json!({
        "artists": artists,
        "albums": albums,
        "tracks": tracks,
        "lastScanAt": last_scan_at,
    }))
}

#[get("/dashboard")]
pub async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let lib_stats = library_stats(&state).await?;
    let recent = AlbumTable::recent(&state.pool, 12).await?;
    let wishlist_count = WishlistTable::count(&state.pool).await?;

    // sum missing across every synced artist; a soft-deleted artist simply
    // drops out of the total
    let mut missing_total: usize = 0;
    for expected_artist in ExpectedArtistTable::all(&state.pool).await? {
        match state.discography.compute_summary(expected_artist.artist_id).await {
            Ok(summary) => missing_total += summary.missing_count,
            Err(err) => debug!(
                "dashboard summary for artist {} unavailable: {err}",
                expected_artist.artist_id
            ),
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "stats": lib_stats,
        "recentAlbums": recent,
        "missingTotal": missing_total,
        "wishlistCount": wishlist_count,
    })))
}
