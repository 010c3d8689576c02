//! REST API routes

pub mod artist;
pub mod expected;
pub mod home;
pub mod library;
pub mod scan;
pub mod settings;
pub mod wishlist;

use std::sync::Arc;

use actix_web::web;
use sqlx::SqlitePool;

use crate::core::discography::DiscographyService;
use crate::core::scanner::Scanner;

/// Everything a handler needs, constructed once in `main` and injected.
pub struct AppState {
    pub pool: SqlitePool,
    pub scanner: Arc<Scanner>,
    pub discography: DiscographyService,
    pub version: String,
    pub git_sha: Option<String>,
    pub default_music_path: String,
}

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(home::health).service(
        web::scope("/api")
            .service(home::stats)
            .service(home::dashboard)
            .service(web::scope("/settings").configure(settings::configure))
            .service(web::scope("/scan").configure(scan::configure))
            .service(web::scope("/library").configure(library::configure))
            .service(web::scope("/artist").configure(artist::configure))
            .service(web::scope("/expected").configure(expected::configure))
            .service(web::scope("/wishlist").configure(wishlist::configure)),
    );
}
