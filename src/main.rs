//! crate-server - catalogs a personal music library and reconciles it
//! against per-artist MusicBrainz discographies.

mod api;
mod config;
mod core;
mod db;
mod errors;
mod models;
mod utils;

use std::path::Path;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::core::discography::DiscographyService;
use crate::core::musicbrainz::MetadataClient;
use crate::core::scanner::Scanner;
use crate::db::tables::SettingsTable;

#[tokio::main]
async fn main() -> Result<()> {
    let args = config::Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{log_level},sqlx=warn,hyper=warn,reqwest=warn"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = config::Config::resolve(args);
    info!("crate-server v{} starting...", config.version);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create data directory {}", config.data_dir.display()))?;

    let pool = db::connect(&config.db_path()).await?;
    db::run_migrations(&pool).await?;

    let default_music_path = config.music_dir.to_string_lossy().to_string();
    let settings = SettingsTable::get_or_init(&pool, &default_music_path).await?;
    if !Path::new(&settings.music_path).is_dir() {
        warn!(
            "music path '{}' does not exist or is not accessible. Is the volume mounted?",
            settings.music_path
        );
    } else {
        info!("music library root: {}", settings.music_path);
    }

    let scanner = Scanner::load(pool.clone()).await?;
    let metadata = MetadataClient::new(&config.version);
    let discography = DiscographyService::new(pool.clone(), metadata);

    let state = web::Data::new(api::AppState {
        pool,
        scanner,
        discography,
        version: config.version.clone(),
        git_sha: config.git_sha.clone(),
        default_music_path,
    });

    let addr = format!("{}:{}", config.host, config.port);
    info!("Server listening on http://{}", addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(api::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
